//! Orchestrator error types.

use std::time::Duration;

use domain::PaymentId;
use saga::{SagaError, SagaStep};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the orchestrator process.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Saga error: {0}")]
    Saga(#[from] SagaError),

    #[error("Could not initialize logging: {0}")]
    Tracing(String),

    #[error("Could not install metrics recorder: {0}")]
    Metrics(String),

    /// The payment's saga did not reach a terminal step in time.
    #[error("Payment {payment_id} not settled after {waited:?} (last step: {step:?})")]
    Timeout {
        payment_id: PaymentId,
        step: Option<SagaStep>,
        waited: Duration,
    },
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
