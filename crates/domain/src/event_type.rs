//! Event discriminators and topic routing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Topic names used by the orchestrator's outbound commands.
pub mod topics {
    /// Hold, release and debit requests for the wallet service.
    pub const ORCHESTRATOR_WALLET: &str = "orchestrator.wallet";
    /// Authorization requests for the payment gateway.
    pub const ORCHESTRATOR_GATEWAY: &str = "orchestrator.gateway";
    /// Status updates for the payment service.
    pub const ORCHESTRATOR_PAYMENT: &str = "orchestrator.payment";
    /// User notifications.
    pub const ORCHESTRATOR_NOTIFICATION: &str = "orchestrator.notification";
}

/// Every event type exchanged around the payment saga.
///
/// Commands are emitted by the orchestrator onto one of the
/// `orchestrator.*` topics. All other events are published by the
/// collaborating services on a topic named after the event type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "hold_funds")]
    HoldFunds,
    #[serde(rename = "release_funds")]
    ReleaseFunds,
    #[serde(rename = "debit_funds")]
    DebitFunds,
    #[serde(rename = "authorize_gateway")]
    AuthorizeGateway,
    #[serde(rename = "payment_update_status")]
    PaymentUpdateStatus,
    #[serde(rename = "notify_user")]
    NotifyUser,

    #[serde(rename = "payment.created")]
    PaymentCreated,
    #[serde(rename = "payment.completed")]
    PaymentCompleted,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "wallet.hold_funds")]
    FundsHeld,
    #[serde(rename = "wallet.hold_funds_failed")]
    FundsHoldFailed,
    #[serde(rename = "wallet.debit_funds")]
    FundsDebited,
    #[serde(rename = "wallet.funds_released")]
    FundsReleased,
    #[serde(rename = "gateway.authorized")]
    GatewayAuthorized,
    #[serde(rename = "gateway.authorization_failed")]
    GatewayAuthorizationFailed,
}

impl EventType {
    /// Events the saga reacts to, in happy-path order followed by failures.
    pub const SAGA_INBOUND: [EventType; 8] = [
        EventType::PaymentCreated,
        EventType::FundsHeld,
        EventType::GatewayAuthorized,
        EventType::FundsDebited,
        EventType::PaymentCompleted,
        EventType::FundsHoldFailed,
        EventType::GatewayAuthorizationFailed,
        EventType::FundsReleased,
    ];

    /// Returns the wire discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::HoldFunds => "hold_funds",
            EventType::ReleaseFunds => "release_funds",
            EventType::DebitFunds => "debit_funds",
            EventType::AuthorizeGateway => "authorize_gateway",
            EventType::PaymentUpdateStatus => "payment_update_status",
            EventType::NotifyUser => "notify_user",
            EventType::PaymentCreated => "payment.created",
            EventType::PaymentCompleted => "payment.completed",
            EventType::PaymentFailed => "payment.failed",
            EventType::FundsHeld => "wallet.hold_funds",
            EventType::FundsHoldFailed => "wallet.hold_funds_failed",
            EventType::FundsDebited => "wallet.debit_funds",
            EventType::FundsReleased => "wallet.funds_released",
            EventType::GatewayAuthorized => "gateway.authorized",
            EventType::GatewayAuthorizationFailed => "gateway.authorization_failed",
        }
    }

    /// Returns true for the orchestrator's own outbound commands.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            EventType::HoldFunds
                | EventType::ReleaseFunds
                | EventType::DebitFunds
                | EventType::AuthorizeGateway
                | EventType::PaymentUpdateStatus
                | EventType::NotifyUser
        )
    }

    /// Returns the topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            EventType::HoldFunds | EventType::ReleaseFunds | EventType::DebitFunds => {
                topics::ORCHESTRATOR_WALLET
            }
            EventType::AuthorizeGateway => topics::ORCHESTRATOR_GATEWAY,
            EventType::PaymentUpdateStatus => topics::ORCHESTRATOR_PAYMENT,
            EventType::NotifyUser => topics::ORCHESTRATOR_NOTIFICATION,
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event_type = match s {
            "hold_funds" => EventType::HoldFunds,
            "release_funds" => EventType::ReleaseFunds,
            "debit_funds" => EventType::DebitFunds,
            "authorize_gateway" => EventType::AuthorizeGateway,
            "payment_update_status" => EventType::PaymentUpdateStatus,
            "notify_user" => EventType::NotifyUser,
            "payment.created" => EventType::PaymentCreated,
            "payment.completed" => EventType::PaymentCompleted,
            "payment.failed" => EventType::PaymentFailed,
            "wallet.hold_funds" => EventType::FundsHeld,
            "wallet.hold_funds_failed" => EventType::FundsHoldFailed,
            "wallet.debit_funds" => EventType::FundsDebited,
            "wallet.funds_released" => EventType::FundsReleased,
            "gateway.authorized" => EventType::GatewayAuthorized,
            "gateway.authorization_failed" => EventType::GatewayAuthorizationFailed,
            other => return Err(SchemaError::UnknownEventType(other.to_string())),
        };
        Ok(event_type)
    }
}
