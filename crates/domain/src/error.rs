//! Schema error types.

use thiserror::Error;

/// Errors raised while encoding or decoding events.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The message carries no `event_type` discriminator.
    #[error("Message has no event_type discriminator")]
    MissingEventType,

    /// The discriminator names an event the receiver does not consume.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The message is not valid JSON or does not match the event's schema.
    #[error("Failed to decode event: {0}")]
    Decode(#[source] serde_json::Error),

    /// The event could not be serialized.
    #[error("Failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Convenience type alias for schema results.
pub type Result<T> = std::result::Result<T, SchemaError>;
