//! Payment saga orchestration.
//!
//! This crate drives a payment through its distributed transaction:
//! 1. Hold funds in the user's wallet
//! 2. Authorize the payment with the gateway
//! 3. Debit the held funds
//! 4. Mark the payment COMPLETED and notify the user
//!
//! A failed hold fails the payment straight away. A declined authorization
//! is compensated by releasing the held funds before the payment is failed.
//! The saga reacts to one inbound event at a time and answers with commands
//! published on the `orchestrator.*` topics.

pub mod command_log;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod retry;
pub mod services;
pub mod state;
pub mod store;

pub use command_log::{
    CommandLog, CommandLogEntry, CommandLogError, CommandStatus, InMemoryCommandLog,
};
pub use commands::{
    AuthorizeGatewayCommand, CommandPublisher, DebitFundsCommand, HoldFundsCommand,
    NotifyUserCommand, ReleaseFundsCommand, UpdatePaymentStatusCommand,
};
pub use dispatcher::SagaDispatcher;
pub use error::{Result, SagaError};
pub use handler::PaymentSagaHandler;
pub use retry::{Backoff, RetryPolicy};
pub use services::{SimulatedGateway, SimulatedNotifier, SimulatedPaymentService, SimulatedWallet};
pub use state::SagaStep;
pub use store::{Disposition, PaymentContext, SagaRecord, SagaStore};
