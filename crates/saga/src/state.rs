//! Payment saga state machine.

use domain::EventType;
use serde::{Deserialize, Serialize};

/// The step a payment's saga has reached.
///
/// State transitions:
/// ```text
/// Created ──► HoldRequested ──┬──► FundsHeld ──► AuthorizeRequested ──┬──► GatewayAuthorized ──► DebitRequested ──► FundsDebited ──► Completed ──► Notified
///                             │                                       │
///                             └──► HoldFailed ──► Failed ──► Notified └──► AuthorizationFailed ──► ReleaseRequested ──► FundsReleased ──► Failed ──► Notified
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStep {
    /// No event has been handled yet.
    #[default]
    Created,
    HoldRequested,
    FundsHeld,
    AuthorizeRequested,
    GatewayAuthorized,
    DebitRequested,
    FundsDebited,
    /// Funds debited and the payment marked COMPLETED.
    Completed,
    /// The user has been told the outcome (terminal state).
    Notified,
    HoldFailed,
    AuthorizationFailed,
    ReleaseRequested,
    FundsReleased,
    /// Payment marked FAILED after compensation.
    Failed,
}

impl SagaStep {
    /// Returns true if no further event moves the saga.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStep::Notified)
    }

    /// Returns true once the payment's outcome has been decided.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SagaStep::Completed | SagaStep::Failed | SagaStep::Notified
        )
    }

    /// Returns the step a saga enters when it starts reacting to `event`.
    ///
    /// Returns `None` for events the saga does not consume.
    pub fn arrival(event: EventType) -> Option<SagaStep> {
        let step = match event {
            EventType::PaymentCreated => SagaStep::Created,
            EventType::FundsHeld => SagaStep::FundsHeld,
            EventType::FundsHoldFailed => SagaStep::HoldFailed,
            EventType::GatewayAuthorized => SagaStep::GatewayAuthorized,
            EventType::GatewayAuthorizationFailed => SagaStep::AuthorizationFailed,
            EventType::FundsDebited => SagaStep::FundsDebited,
            EventType::PaymentCompleted => SagaStep::Completed,
            EventType::FundsReleased => SagaStep::FundsReleased,
            _ => return None,
        };
        Some(step)
    }

    /// Returns the step a saga reaches once its reaction to `event` succeeded.
    pub fn outcome(event: EventType) -> Option<SagaStep> {
        let step = match event {
            EventType::PaymentCreated => SagaStep::HoldRequested,
            EventType::FundsHeld => SagaStep::AuthorizeRequested,
            EventType::FundsHoldFailed => SagaStep::Failed,
            EventType::GatewayAuthorized => SagaStep::DebitRequested,
            EventType::GatewayAuthorizationFailed => SagaStep::ReleaseRequested,
            EventType::FundsDebited => SagaStep::Completed,
            EventType::PaymentCompleted => SagaStep::Notified,
            EventType::FundsReleased => SagaStep::Failed,
            _ => return None,
        };
        Some(step)
    }

    /// Returns true if `event` may be handled from this step.
    ///
    /// A saga still on `Created` with no history accepts any event because
    /// payloads carry the full payment context; `fresh` tells whether that
    /// is the case. An event is also permitted from its own arrival step so
    /// a reaction that failed part way can be retried by a redelivery.
    pub fn permits(&self, event: EventType, fresh: bool) -> bool {
        if fresh && *self == SagaStep::Created {
            return SagaStep::arrival(event).is_some();
        }
        match event {
            EventType::PaymentCreated => matches!(self, SagaStep::Created),
            EventType::FundsHeld => matches!(self, SagaStep::HoldRequested | SagaStep::FundsHeld),
            EventType::FundsHoldFailed => {
                matches!(self, SagaStep::HoldRequested | SagaStep::HoldFailed)
            }
            EventType::GatewayAuthorized => matches!(
                self,
                SagaStep::AuthorizeRequested | SagaStep::GatewayAuthorized
            ),
            EventType::GatewayAuthorizationFailed => matches!(
                self,
                SagaStep::AuthorizeRequested | SagaStep::AuthorizationFailed
            ),
            EventType::FundsDebited => {
                matches!(self, SagaStep::DebitRequested | SagaStep::FundsDebited)
            }
            EventType::PaymentCompleted => matches!(self, SagaStep::Completed),
            EventType::FundsReleased => {
                matches!(self, SagaStep::ReleaseRequested | SagaStep::FundsReleased)
            }
            _ => false,
        }
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::Created => "Created",
            SagaStep::HoldRequested => "HoldRequested",
            SagaStep::FundsHeld => "FundsHeld",
            SagaStep::AuthorizeRequested => "AuthorizeRequested",
            SagaStep::GatewayAuthorized => "GatewayAuthorized",
            SagaStep::DebitRequested => "DebitRequested",
            SagaStep::FundsDebited => "FundsDebited",
            SagaStep::Completed => "Completed",
            SagaStep::Notified => "Notified",
            SagaStep::HoldFailed => "HoldFailed",
            SagaStep::AuthorizationFailed => "AuthorizationFailed",
            SagaStep::ReleaseRequested => "ReleaseRequested",
            SagaStep::FundsReleased => "FundsReleased",
            SagaStep::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
