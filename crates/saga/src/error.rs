//! Saga error types.

use domain::SchemaError;
use event_bus::EventBusError;
use thiserror::Error;

/// Errors returned by saga commands and handlers.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Every publish attempt failed; carries the last transport error.
    #[error("Failed to publish {event_type} to {topic} after {attempts} attempts: {source}")]
    Publish {
        event_type: &'static str,
        topic: &'static str,
        attempts: u32,
        #[source]
        source: EventBusError,
    },

    /// The command could not be serialized, so nothing was published.
    #[error("Failed to serialize {event_type}: {source}")]
    Serialization {
        event_type: &'static str,
        #[source]
        source: SchemaError,
    },

    /// An inbound message did not match the event schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
