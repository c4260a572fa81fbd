//! Event schema for the payment saga.
//!
//! This crate provides:
//! - The versioned [`CommandEvent`] envelope and the typed [`Event`] wrapper
//! - Payloads exchanged with the wallet, gateway, payment and notification domains
//! - The [`EventType`] discriminators and their topic routing
//! - The [`Payment`] record owned by the payment service
//! - [`InboundEvent`], the decoded form of everything the saga consumes

pub mod error;
pub mod event;
pub mod event_type;
pub mod inbound;
pub mod payloads;
pub mod payment;

pub use common::{PaymentId, TraceId, WalletId};
pub use error::{Result, SchemaError};
pub use event::{
    CommandEvent, DeduplicationId, EVENT_VERSION, Event, EventMetadata, peek_event_type,
};
pub use event_type::{EventType, topics};
pub use inbound::InboundEvent;
pub use payloads::{
    GatewayAuthorizationFailed, GatewayAuthorized, Notification, NotifyUser, PaymentCreated,
    PaymentScoped, PaymentStatusUpdate, WalletCommand,
};
pub use payment::{Payment, PaymentStatus};
