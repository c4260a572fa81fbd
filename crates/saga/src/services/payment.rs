//! Simulated payment service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use domain::{
    Event, EventType, Payment, PaymentId, PaymentStatus, PaymentStatusUpdate, peek_event_type,
    topics,
};
use event_bus::{EventBus, handler_fn};

use super::{reply, simulate_latency};
use crate::error::{Result, SagaError};

#[derive(Debug, Default)]
struct PaymentServiceState {
    payments: HashMap<PaymentId, Payment>,
    statuses: HashMap<PaymentId, Vec<PaymentStatus>>,
    latency: Duration,
}

/// Owns payment rows and applies status updates from `orchestrator.payment`.
///
/// A COMPLETED update answers `payment.completed`; a FAILED update answers
/// `payment.failed`.
#[derive(Debug, Clone)]
pub struct SimulatedPaymentService<B> {
    bus: B,
    state: Arc<RwLock<PaymentServiceState>>,
}

impl<B> SimulatedPaymentService<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            state: Arc::default(),
        }
    }

    /// Subscribes the service to its request topic.
    pub async fn start(&self) {
        let service = self.clone();
        self.bus
            .subscribe(
                topics::ORCHESTRATOR_PAYMENT,
                handler_fn(move |message| {
                    let service = service.clone();
                    async move { service.on_message(&message).await }
                }),
            )
            .await;
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Stores a new payment and publishes its `payment.created` event.
    pub async fn create(&self, payment: Payment, token: Option<String>) -> Result<()> {
        let event_type = EventType::PaymentCreated;
        let event = payment.created_event(token);
        self.write().payments.insert(payment.id.clone(), payment);

        let bytes = event.encode().map_err(|source| SagaError::Serialization {
            event_type: event_type.as_str(),
            source,
        })?;
        tracing::info!(payment_id = %event.payload.payment_id, "payment created");
        self.bus
            .publish(event_type.topic(), bytes)
            .await
            .map_err(|source| SagaError::Publish {
                event_type: event_type.as_str(),
                topic: event_type.topic(),
                attempts: 1,
                source,
            })
    }

    /// Returns a stored payment.
    pub fn payment(&self, payment_id: &PaymentId) -> Option<Payment> {
        self.read().payments.get(payment_id).cloned()
    }

    /// Returns every status update received for a payment, oldest first.
    pub fn status_updates(&self, payment_id: &PaymentId) -> Vec<PaymentStatus> {
        self.read()
            .statuses
            .get(payment_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn on_message(&self, message: &[u8]) {
        match peek_event_type(message) {
            Ok(EventType::PaymentUpdateStatus) => {}
            Ok(other) => {
                tracing::warn!(event_type = %other, "payment service ignoring unexpected request");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "payment service could not read request");
                return;
            }
        }
        let update = match Event::<PaymentStatusUpdate>::decode(message) {
            Ok(event) => event.payload,
            Err(e) => {
                tracing::error!(error = %e, "payment service could not decode request");
                return;
            }
        };

        let latency = self.read().latency;
        simulate_latency(latency).await;

        {
            let mut state = self.write();
            state
                .statuses
                .entry(update.payment_id.clone())
                .or_default()
                .push(update.status);
            if let Some(payment) = state.payments.get_mut(&update.payment_id) {
                payment.set_status(update.status);
            }
        }
        tracing::info!(payment_id = %update.payment_id, status = %update.status, "payment status updated");

        let answer = match update.status {
            PaymentStatus::Completed => EventType::PaymentCompleted,
            PaymentStatus::Failed => EventType::PaymentFailed,
            PaymentStatus::Pending => {
                tracing::warn!(payment_id = %update.payment_id, "payment moved back to pending, no answer sent");
                return;
            }
        };
        reply(&self.bus, answer, update).await;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PaymentServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PaymentServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
