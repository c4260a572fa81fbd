//! Simulated collaborators for the payment saga.
//!
//! Each service listens on its `orchestrator.*` topic and answers on the
//! topic named after its reply event, the way the real wallet, gateway,
//! payment and notification services would. They exist for tests and the
//! demo binary; every one can be told to fail or to answer slowly.

pub mod gateway;
pub mod notifier;
pub mod payment;
pub mod wallet;

pub use gateway::SimulatedGateway;
pub use notifier::SimulatedNotifier;
pub use payment::SimulatedPaymentService;
pub use wallet::SimulatedWallet;

use std::time::Duration;

use domain::{Event, EventType, PaymentScoped};
use event_bus::EventBus;
use serde::Serialize;

/// Publishes an answer event with a fresh envelope on its own topic.
async fn reply<B, P>(bus: &B, event_type: EventType, payload: P)
where
    B: EventBus + ?Sized,
    P: Serialize + PaymentScoped,
{
    let payment_id = payload.payment_id().clone();
    let event = Event::new(event_type, &payment_id, payload);
    let bytes = match event.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%event_type, error = %e, "could not encode reply");
            return;
        }
    };
    if let Err(e) = bus.publish(event_type.topic(), bytes).await {
        tracing::error!(%event_type, error = %e, "could not publish reply");
    }
}

/// Sleeps for the simulated processing time, if any.
async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
