//! Outbound commands issued by the payment saga.
//!
//! Every command follows the same algorithm, implemented once by
//! [`CommandPublisher::emit`]:
//! 1. Generate a fresh trace id
//! 2. Build the versioned event around the payload
//! 3. Serialize it; on failure record it in the command log and stop
//! 4. Publish it on the command's topic under the retry policy
//! 5. On exhausted retries record it in the command log and return the last error

pub mod authorize_gateway;
pub mod debit_funds;
pub mod hold_funds;
pub mod notify_user;
pub mod release_funds;
pub mod update_payment_status;

pub use authorize_gateway::AuthorizeGatewayCommand;
pub use debit_funds::DebitFundsCommand;
pub use hold_funds::HoldFundsCommand;
pub use notify_user::NotifyUserCommand;
pub use release_funds::ReleaseFundsCommand;
pub use update_payment_status::UpdatePaymentStatusCommand;

use domain::{CommandEvent, Event, EventType, PaymentScoped, TraceId};
use event_bus::EventBus;
use serde::Serialize;

use crate::command_log::{CommandLog, CommandStatus};
use crate::error::{Result, SagaError};
use crate::retry::RetryPolicy;

/// Shared publishing machinery behind every command.
#[derive(Debug, Clone)]
pub struct CommandPublisher<B, L> {
    bus: B,
    log: L,
    retry: RetryPolicy,
}

impl<B, L> CommandPublisher<B, L>
where
    B: EventBus,
    L: CommandLog,
{
    /// Creates a publisher with the default retry policy.
    pub fn new(bus: B, log: L) -> Self {
        Self::with_retry_policy(bus, log, RetryPolicy::default())
    }

    /// Creates a publisher with a custom retry policy.
    pub fn with_retry_policy(bus: B, log: L, retry: RetryPolicy) -> Self {
        Self { bus, log, retry }
    }

    /// Returns the retry policy applied to every publish.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds, serializes and publishes one command.
    #[tracing::instrument(
        skip(self, payload),
        fields(
            event_type = %event_type,
            payment_id = %payload.payment_id(),
            trace_id = tracing::field::Empty,
        )
    )]
    pub async fn emit<P>(&self, event_type: EventType, payload: P) -> Result<()>
    where
        P: Serialize + PaymentScoped + Send + Sync,
    {
        let trace_id = TraceId::new();
        tracing::Span::current().record("trace_id", tracing::field::display(&trace_id));

        let envelope = CommandEvent::with_trace_id(event_type, payload.payment_id(), trace_id);
        let event = Event::from_parts(envelope, payload);

        let bytes = match event.encode() {
            Ok(bytes) => bytes,
            Err(source) => {
                tracing::error!(error = %source, "failed to serialize command");
                self.record_failure(&event).await;
                return Err(SagaError::Serialization {
                    event_type: event_type.as_str(),
                    source,
                });
            }
        };

        let topic = event_type.topic();
        let published = self
            .retry
            .run(|| self.bus.publish(topic, bytes.clone()))
            .await;

        match published {
            Ok(()) => {
                tracing::debug!(topic, "command published");
                metrics::counter!("saga_commands_published_total", "event_type" => event_type.as_str())
                    .increment(1);
                Ok(())
            }
            Err(source) => {
                let attempts = self.retry.attempts();
                tracing::error!(topic, attempts, error = %source, "failed to publish command");
                metrics::counter!("saga_command_failures_total", "event_type" => event_type.as_str())
                    .increment(1);
                self.record_failure(&event).await;
                Err(SagaError::Publish {
                    event_type: event_type.as_str(),
                    topic,
                    attempts,
                    source,
                })
            }
        }
    }

    /// Records a failed command; a log failure is reported and swallowed.
    async fn record_failure<P: Serialize>(&self, event: &Event<P>) {
        let payload = serde_json::to_value(&event.payload).unwrap_or(serde_json::Value::Null);
        if let Err(e) = self
            .log
            .save(CommandStatus::Failed, &event.envelope, &payload)
            .await
        {
            tracing::error!(error = %e, "failed to record command in command log");
        }
    }
}
