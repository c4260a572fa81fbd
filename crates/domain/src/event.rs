use chrono::{DateTime, Utc};
use common::{PaymentId, TraceId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EventType, PaymentScoped, Result, SchemaError};

/// Schema version stamped on every event this crate builds.
pub const EVENT_VERSION: &str = "1";

fn default_event_version() -> String {
    EVENT_VERSION.to_string()
}

/// Deterministic identifier of one logical command for one payment.
///
/// Always `event_type + "." + payment_id`, so a consumer can recognize a
/// redelivery of the same command and discard it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeduplicationId(String);

impl DeduplicationId {
    /// Builds the deduplication id for an event type and payment.
    pub fn new(event_type: &str, payment_id: &PaymentId) -> Self {
        Self(format!("{event_type}.{payment_id}"))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no id was supplied on the wire.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for DeduplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery metadata carried by every event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation id for logs and audit records.
    #[serde(default)]
    pub trace_id: TraceId,

    /// Ordering group; always the payment id.
    #[serde(default)]
    pub message_group_id: String,

    /// See [`DeduplicationId`].
    #[serde(rename = "message_deduplication_id", default)]
    pub deduplication_id: DeduplicationId,
}

/// The envelope shared by every event.
///
/// Only `event_type` is mandatory when decoding; producers outside this
/// workspace are not required to stamp the remaining fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// The discriminator read first by every dispatcher.
    pub event_type: String,

    /// Schema version of the payload.
    #[serde(default = "default_event_version")]
    pub event_version: String,

    /// When the event was built (UTC).
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Delivery metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl CommandEvent {
    /// Builds a version-1 envelope for a payment, stamped now, with a fresh trace id.
    pub fn new(event_type: EventType, payment_id: &PaymentId) -> Self {
        Self::with_trace_id(event_type, payment_id, TraceId::new())
    }

    /// Builds a version-1 envelope carrying an existing trace id.
    pub fn with_trace_id(event_type: EventType, payment_id: &PaymentId, trace_id: TraceId) -> Self {
        Self {
            event_type: event_type.as_str().to_string(),
            event_version: default_event_version(),
            timestamp: Utc::now(),
            metadata: EventMetadata {
                trace_id,
                message_group_id: payment_id.to_string(),
                deduplication_id: DeduplicationId::new(event_type.as_str(), payment_id),
            },
        }
    }

    /// Returns the trace id.
    pub fn trace_id(&self) -> &TraceId {
        &self.metadata.trace_id
    }

    /// Returns the deduplication id as stamped by the producer.
    pub fn deduplication_id(&self) -> &DeduplicationId {
        &self.metadata.deduplication_id
    }

    /// Returns the stamped deduplication id, or derives it when the producer left it blank.
    pub fn deduplication_id_for(&self, payment_id: &PaymentId) -> DeduplicationId {
        if self.metadata.deduplication_id.is_empty() {
            DeduplicationId::new(&self.event_type, payment_id)
        } else {
            self.metadata.deduplication_id.clone()
        }
    }
}

/// A concrete event: the envelope fields at top level plus a typed `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    #[serde(flatten)]
    pub envelope: CommandEvent,
    pub payload: P,
}

impl<P> Event<P> {
    /// Builds an event with a fresh envelope.
    pub fn new(event_type: EventType, payment_id: &PaymentId, payload: P) -> Self {
        Self {
            envelope: CommandEvent::new(event_type, payment_id),
            payload,
        }
    }

    /// Builds an event around an existing envelope.
    pub fn from_parts(envelope: CommandEvent, payload: P) -> Self {
        Self { envelope, payload }
    }

    /// Returns the wire discriminator.
    pub fn event_type(&self) -> &str {
        &self.envelope.event_type
    }
}

impl<P: PaymentScoped> Event<P> {
    /// Returns the deduplication id of this event; see [`CommandEvent::deduplication_id_for`].
    pub fn deduplication_id(&self) -> DeduplicationId {
        self.envelope.deduplication_id_for(self.payload.payment_id())
    }
}

impl<P: Serialize> Event<P> {
    /// Serializes the event to its JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(SchemaError::Encode)
    }
}

impl<P: DeserializeOwned> Event<P> {
    /// Parses an event from its JSON wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(SchemaError::Decode)
    }
}

#[derive(Deserialize)]
struct EventHeader {
    #[serde(default)]
    event_type: Option<String>,
}

/// Reads only the `event_type` discriminator of a message.
pub fn peek_event_type(bytes: &[u8]) -> Result<EventType> {
    let header: EventHeader = serde_json::from_slice(bytes).map_err(SchemaError::Decode)?;
    match header.event_type {
        Some(event_type) if !event_type.is_empty() => event_type.parse(),
        _ => Err(SchemaError::MissingEventType),
    }
}
