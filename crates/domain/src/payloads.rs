//! Typed event payloads.
//!
//! Every payload carries enough payment context (wallet, amount, currency)
//! for the next saga step to act without consulting any other store.

use common::{PaymentId, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PaymentStatus;

/// Payloads that belong to exactly one payment.
pub trait PaymentScoped {
    /// Returns the payment this payload is about.
    fn payment_id(&self) -> &PaymentId;
}

/// Published by the payment service once a payment row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCreated {
    #[serde(alias = "id")]
    pub payment_id: PaymentId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub currency: String,
    /// Card or wallet token forwarded to the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Wallet request and answer payload.
///
/// Shared by hold, release and debit requests, by the wallet's answers, and
/// by gateway authorization requests (the only ones that carry a token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCommand {
    pub wallet_id: WalletId,
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Published by the gateway when it authorizes a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayAuthorized {
    pub payment_id: PaymentId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub currency: String,
}

/// Published by the gateway when it declines a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayAuthorizationFailed {
    pub payment_id: PaymentId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub reason: String,
}

/// Status change of a payment; used for the update request and its outcome events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
}

/// The notifications a user can receive about a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    PaymentSuccess,
    PaymentFailure,
    RefundSuccess,
    RefundFailure,
}

impl Notification {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Notification::PaymentSuccess => "payment_success",
            Notification::PaymentFailure => "payment_failure",
            Notification::RefundSuccess => "refund_success",
            Notification::RefundFailure => "refund_failure",
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to notify the owner of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyUser {
    pub payment_id: PaymentId,
    pub notification: Notification,
}

impl From<&PaymentCreated> for WalletCommand {
    fn from(event: &PaymentCreated) -> Self {
        Self {
            wallet_id: event.wallet_id.clone(),
            payment_id: event.payment_id.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
            token: event.token.clone(),
        }
    }
}

macro_rules! payment_scoped {
    ($($payload:ty),* $(,)?) => {
        $(
            impl PaymentScoped for $payload {
                fn payment_id(&self) -> &PaymentId {
                    &self.payment_id
                }
            }
        )*
    };
}

payment_scoped!(
    PaymentCreated,
    WalletCommand,
    GatewayAuthorized,
    GatewayAuthorizationFailed,
    PaymentStatusUpdate,
    NotifyUser,
);
