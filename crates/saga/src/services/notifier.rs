//! Simulated notification service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use domain::{Event, EventType, Notification, NotifyUser, PaymentId, peek_event_type, topics};
use event_bus::{EventBus, handler_fn};

/// Records every `notify_user` request received on `orchestrator.notification`.
#[derive(Debug, Clone)]
pub struct SimulatedNotifier<B> {
    bus: B,
    sent: Arc<RwLock<HashMap<PaymentId, Vec<Notification>>>>,
}

impl<B> SimulatedNotifier<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            sent: Arc::default(),
        }
    }

    /// Subscribes the notifier to its request topic.
    pub async fn start(&self) {
        let notifier = self.clone();
        self.bus
            .subscribe(
                topics::ORCHESTRATOR_NOTIFICATION,
                handler_fn(move |message| {
                    let notifier = notifier.clone();
                    async move { notifier.on_message(&message) }
                }),
            )
            .await;
    }

    /// Returns the notifications sent for a payment, oldest first.
    pub fn notifications(&self, payment_id: &PaymentId) -> Vec<Notification> {
        self.sent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(payment_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of notifications sent across all payments.
    pub fn total(&self) -> usize {
        self.sent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    fn on_message(&self, message: &[u8]) {
        if !matches!(peek_event_type(message), Ok(EventType::NotifyUser)) {
            tracing::warn!("notifier ignoring unexpected message");
            return;
        }
        let request = match Event::<NotifyUser>::decode(message) {
            Ok(event) => event.payload,
            Err(e) => {
                tracing::error!(error = %e, "notifier could not decode request");
                return;
            }
        };

        tracing::info!(
            payment_id = %request.payment_id,
            notification = %request.notification,
            "sending notification"
        );
        self.sent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(request.payment_id)
            .or_default()
            .push(request.notification);
    }
}
