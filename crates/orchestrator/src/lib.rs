//! Payment saga orchestrator process.
//!
//! Wires the in-memory event bus, the saga handler and the simulated
//! wallet, gateway, payment and notification services into one running
//! system, and sets up structured logging from [`Config`].

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use domain::{Payment, PaymentId};
use event_bus::InMemoryEventBus;
use saga::{
    CommandPublisher, InMemoryCommandLog, PaymentSagaHandler, SagaDispatcher, SagaRecord,
    SagaStore, SimulatedGateway, SimulatedNotifier, SimulatedPaymentService, SimulatedWallet,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use config::{Config, ConfigError, LogFormat};
pub use error::{OrchestratorError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Installs the global tracing subscriber described by `config`.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.map_err(|e| OrchestratorError::Tracing(e.to_string()))
}

/// A running saga with its collaborating services.
pub struct Orchestrator {
    bus: InMemoryEventBus,
    log: InMemoryCommandLog,
    dispatcher: SagaDispatcher<InMemoryEventBus, InMemoryCommandLog>,
    wallet: SimulatedWallet<InMemoryEventBus>,
    gateway: SimulatedGateway<InMemoryEventBus>,
    payments: SimulatedPaymentService<InMemoryEventBus>,
    notifier: SimulatedNotifier<InMemoryEventBus>,
}

impl Orchestrator {
    /// Subscribes the saga and every simulated service to a fresh bus.
    pub async fn start(config: &Config) -> Self {
        let bus = InMemoryEventBus::new();
        let log = InMemoryCommandLog::new();
        let publisher =
            CommandPublisher::with_retry_policy(bus.clone(), log.clone(), config.retry_policy());
        let handler = Arc::new(PaymentSagaHandler::new(publisher));
        let dispatcher = SagaDispatcher::attach(&bus, handler).await;

        let wallet = SimulatedWallet::new(bus.clone());
        wallet.set_fail_on_hold(config.fail_hold);
        wallet.start().await;

        let gateway = SimulatedGateway::new(bus.clone());
        if config.fail_authorize {
            gateway.set_decline(Some("declined by issuer"));
        }
        gateway.start().await;

        let payments = SimulatedPaymentService::new(bus.clone());
        payments.start().await;

        let notifier = SimulatedNotifier::new(bus.clone());
        notifier.start().await;

        tracing::info!(
            retry_attempts = config.retry_attempts,
            fail_hold = config.fail_hold,
            fail_authorize = config.fail_authorize,
            "orchestrator started"
        );

        Self {
            bus,
            log,
            dispatcher,
            wallet,
            gateway,
            payments,
            notifier,
        }
    }

    /// Creates a payment and starts its saga.
    pub async fn submit(&self, payment: Payment, token: Option<String>) -> Result<PaymentId> {
        let payment_id = payment.id.clone();
        self.payments.create(payment, token).await?;
        Ok(payment_id)
    }

    /// Waits until the payment's saga reaches its terminal step.
    pub async fn wait_for_outcome(
        &self,
        payment_id: &PaymentId,
        timeout: Duration,
    ) -> Result<SagaRecord> {
        let store = self.store();
        let polled = tokio::time::timeout(timeout, async {
            loop {
                if let Some(record) = store.snapshot(payment_id).await {
                    if record.step().is_terminal() {
                        return record;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;

        match polled {
            Ok(record) => Ok(record),
            Err(_) => Err(OrchestratorError::Timeout {
                payment_id: payment_id.clone(),
                step: store.step(payment_id).await,
                waited: timeout,
            }),
        }
    }

    pub fn bus(&self) -> &InMemoryEventBus {
        &self.bus
    }

    pub fn store(&self) -> &SagaStore {
        self.dispatcher.handler().store()
    }

    pub fn command_log(&self) -> &InMemoryCommandLog {
        &self.log
    }

    pub fn wallet(&self) -> &SimulatedWallet<InMemoryEventBus> {
        &self.wallet
    }

    pub fn gateway(&self) -> &SimulatedGateway<InMemoryEventBus> {
        &self.gateway
    }

    pub fn payments(&self) -> &SimulatedPaymentService<InMemoryEventBus> {
        &self.payments
    }

    pub fn notifier(&self) -> &SimulatedNotifier<InMemoryEventBus> {
        &self.notifier
    }
}
