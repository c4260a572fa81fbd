//! Simulated payment gateway.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use domain::{
    Event, EventType, GatewayAuthorizationFailed, GatewayAuthorized, PaymentId, WalletCommand,
    peek_event_type, topics,
};
use event_bus::{EventBus, handler_fn};

use super::{reply, simulate_latency};

#[derive(Debug, Default)]
struct GatewayState {
    decisions: HashMap<PaymentId, bool>,
    decline_reason: Option<String>,
    latency: Duration,
}

/// Answers `authorize_gateway` requests on `orchestrator.gateway`.
///
/// Authorizes every payment unless told to decline, in which case it
/// answers `gateway.authorization_failed` carrying the configured reason.
#[derive(Debug, Clone)]
pub struct SimulatedGateway<B> {
    bus: B,
    state: Arc<RwLock<GatewayState>>,
}

impl<B> SimulatedGateway<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            state: Arc::default(),
        }
    }

    /// Subscribes the gateway to its request topic.
    pub async fn start(&self) {
        let gateway = self.clone();
        self.bus
            .subscribe(
                topics::ORCHESTRATOR_GATEWAY,
                handler_fn(move |message| {
                    let gateway = gateway.clone();
                    async move { gateway.on_message(&message).await }
                }),
            )
            .await;
    }

    /// Declines every subsequent authorization with `reason`; `None` authorizes again.
    pub fn set_decline(&self, reason: Option<&str>) {
        self.write().decline_reason = reason.map(str::to_string);
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Returns whether a payment was authorized, if it was seen.
    pub fn authorized(&self, payment_id: &PaymentId) -> Option<bool> {
        self.read().decisions.get(payment_id).copied()
    }

    /// Returns the number of authorization requests answered.
    pub fn request_count(&self) -> usize {
        self.read().decisions.len()
    }

    async fn on_message(&self, message: &[u8]) {
        match peek_event_type(message) {
            Ok(EventType::AuthorizeGateway) => {}
            Ok(other) => {
                tracing::warn!(event_type = %other, "gateway ignoring unexpected request");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "gateway could not read request");
                return;
            }
        }
        let request = match Event::<WalletCommand>::decode(message) {
            Ok(event) => event.payload,
            Err(e) => {
                tracing::error!(error = %e, "gateway could not decode request");
                return;
            }
        };

        let latency = self.read().latency;
        simulate_latency(latency).await;

        let decline_reason = {
            let mut state = self.write();
            let reason = state.decline_reason.clone();
            state
                .decisions
                .insert(request.payment_id.clone(), reason.is_none());
            reason
        };

        match decline_reason {
            None => {
                tracing::info!(payment_id = %request.payment_id, "gateway authorized payment");
                let answer = GatewayAuthorized {
                    payment_id: request.payment_id,
                    wallet_id: request.wallet_id,
                    amount: request.amount,
                    currency: request.currency,
                };
                reply(&self.bus, EventType::GatewayAuthorized, answer).await;
            }
            Some(reason) => {
                tracing::info!(payment_id = %request.payment_id, %reason, "gateway declined payment");
                let answer = GatewayAuthorizationFailed {
                    payment_id: request.payment_id,
                    wallet_id: request.wallet_id,
                    amount: request.amount,
                    currency: request.currency,
                    reason,
                };
                reply(&self.bus, EventType::GatewayAuthorizationFailed, answer).await;
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
