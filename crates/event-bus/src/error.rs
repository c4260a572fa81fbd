use thiserror::Error;

/// Errors that can occur when publishing to the event transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventBusError {
    /// The message body was empty.
    #[error("Refusing to publish an empty message to topic {topic}")]
    EmptyMessage { topic: String },

    /// The transport could not accept the message.
    #[error("Event bus unavailable for topic {topic}: {reason}")]
    Unavailable { topic: String, reason: String },
}

/// Result type for event transport operations.
pub type Result<T> = std::result::Result<T, EventBusError>;
