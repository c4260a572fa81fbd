use domain::{EventType, Notification, NotifyUser, PaymentId};
use event_bus::EventBus;

use super::CommandPublisher;
use crate::command_log::CommandLog;
use crate::error::Result;

/// Asks the notification service to tell the user about a payment.
#[derive(Debug, Clone)]
pub struct NotifyUserCommand<B, L> {
    publisher: CommandPublisher<B, L>,
}

impl<B: EventBus, L: CommandLog> NotifyUserCommand<B, L> {
    pub fn new(publisher: CommandPublisher<B, L>) -> Self {
        Self { publisher }
    }

    /// Publishes `notify_user` on `orchestrator.notification`.
    pub async fn notify(&self, payment_id: &PaymentId, notification: Notification) -> Result<()> {
        let payload = NotifyUser {
            payment_id: payment_id.clone(),
            notification,
        };
        self.publisher.emit(EventType::NotifyUser, payload).await
    }
}
