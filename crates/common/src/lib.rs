//! Identifier types shared by every crate in the payment saga workspace.

pub mod types;

pub use types::{PaymentId, TraceId, WalletId};
