//! The payment record owned by the payment service.

use chrono::{DateTime, Utc};
use common::{PaymentId, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Event, EventType, PaymentCreated};

/// Lifecycle status of a payment.
///
/// ```text
/// Pending ──┬──► Completed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Returns true once the payment's financial outcome is fixed.
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment as stored by the payment service.
///
/// The saga never holds or mutates these; it only requests status changes
/// through the payment topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub wallet_id: WalletId,
    pub service_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a pending payment with a fresh id.
    pub fn new(
        wallet_id: WalletId,
        service_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            wallet_id,
            service_id: service_id.into(),
            amount,
            currency: currency.into(),
            method: method.into(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Moves the payment to a new status and stamps `updated_at`.
    pub fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }

    /// Builds the `payment.created` event that starts this payment's saga.
    pub fn created_event(&self, token: Option<String>) -> Event<PaymentCreated> {
        Event::new(
            EventType::PaymentCreated,
            &self.id,
            PaymentCreated {
                payment_id: self.id.clone(),
                wallet_id: self.wallet_id.clone(),
                amount: self.amount,
                currency: self.currency.clone(),
                token,
            },
        )
    }
}
