//! Simulated wallet service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use domain::{Event, EventType, PaymentId, WalletCommand, peek_event_type, topics};
use event_bus::{EventBus, handler_fn};
use rust_decimal::Decimal;

use super::{reply, simulate_latency};

#[derive(Debug, Default)]
struct WalletState {
    held: HashMap<PaymentId, Decimal>,
    debited: HashMap<PaymentId, Decimal>,
    released: HashMap<PaymentId, Decimal>,
    fail_on_hold: bool,
    latency: Duration,
}

/// Answers hold, debit and release requests on `orchestrator.wallet`.
///
/// A hold answers `wallet.hold_funds`, or `wallet.hold_funds_failed` when
/// told to fail. A debit answers `wallet.debit_funds` and a release answers
/// `wallet.funds_released`. Answers echo the request's payload.
#[derive(Debug, Clone)]
pub struct SimulatedWallet<B> {
    bus: B,
    state: Arc<RwLock<WalletState>>,
}

impl<B> SimulatedWallet<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            state: Arc::default(),
        }
    }

    /// Subscribes the wallet to its request topic.
    pub async fn start(&self) {
        let wallet = self.clone();
        self.bus
            .subscribe(
                topics::ORCHESTRATOR_WALLET,
                handler_fn(move |message| {
                    let wallet = wallet.clone();
                    async move { wallet.on_message(&message).await }
                }),
            )
            .await;
    }

    /// Makes every subsequent hold fail.
    pub fn set_fail_on_hold(&self, fail: bool) {
        self.write().fail_on_hold = fail;
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Returns the amount currently held for a payment.
    pub fn held(&self, payment_id: &PaymentId) -> Option<Decimal> {
        self.read().held.get(payment_id).copied()
    }

    /// Returns the amount debited for a payment.
    pub fn debited(&self, payment_id: &PaymentId) -> Option<Decimal> {
        self.read().debited.get(payment_id).copied()
    }

    /// Returns the amount released back for a payment.
    pub fn released(&self, payment_id: &PaymentId) -> Option<Decimal> {
        self.read().released.get(payment_id).copied()
    }

    async fn on_message(&self, message: &[u8]) {
        let event_type = match peek_event_type(message) {
            Ok(event_type) => event_type,
            Err(e) => {
                tracing::error!(error = %e, "wallet could not read request");
                return;
            }
        };
        let request = match Event::<WalletCommand>::decode(message) {
            Ok(event) => event.payload,
            Err(e) => {
                tracing::error!(%event_type, error = %e, "wallet could not decode request");
                return;
            }
        };

        let latency = self.read().latency;
        simulate_latency(latency).await;

        let answer = match event_type {
            EventType::HoldFunds => self.hold(&request),
            EventType::DebitFunds => self.debit(&request),
            EventType::ReleaseFunds => self.release(&request),
            other => {
                tracing::warn!(event_type = %other, "wallet ignoring unexpected request");
                return;
            }
        };

        reply(&self.bus, answer, request).await;
    }

    fn hold(&self, request: &WalletCommand) -> EventType {
        let mut state = self.write();
        if state.fail_on_hold {
            tracing::info!(payment_id = %request.payment_id, "wallet rejected hold");
            return EventType::FundsHoldFailed;
        }
        state.held.insert(request.payment_id.clone(), request.amount);
        tracing::info!(payment_id = %request.payment_id, amount = %request.amount, "wallet held funds");
        EventType::FundsHeld
    }

    fn debit(&self, request: &WalletCommand) -> EventType {
        let mut state = self.write();
        state.held.remove(&request.payment_id);
        state.debited.insert(request.payment_id.clone(), request.amount);
        tracing::info!(payment_id = %request.payment_id, amount = %request.amount, "wallet debited funds");
        EventType::FundsDebited
    }

    fn release(&self, request: &WalletCommand) -> EventType {
        let mut state = self.write();
        state.held.remove(&request.payment_id);
        state.released.insert(request.payment_id.clone(), request.amount);
        tracing::info!(payment_id = %request.payment_id, amount = %request.amount, "wallet released funds");
        EventType::FundsReleased
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, WalletState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, WalletState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
