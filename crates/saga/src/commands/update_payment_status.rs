use domain::{EventType, PaymentId, PaymentStatus, PaymentStatusUpdate};
use event_bus::EventBus;

use super::CommandPublisher;
use crate::command_log::CommandLog;
use crate::error::Result;

/// Asks the payment service to record a payment's outcome.
#[derive(Debug, Clone)]
pub struct UpdatePaymentStatusCommand<B, L> {
    publisher: CommandPublisher<B, L>,
}

impl<B: EventBus, L: CommandLog> UpdatePaymentStatusCommand<B, L> {
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self { publisher }
    }

    /// Publishes `payment_update_status` on `orchestrator.payment`.
    pub async fn update_status(&self, payment_id: &PaymentId, status: PaymentStatus) -> Result<()> {
        let payload = PaymentStatusUpdate {
            payment_id: payment_id.clone(),
            status,
        };
        self.publisher
            .emit(EventType::PaymentUpdateStatus, payload)
            .await
    }
}
