use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::Instrument;

use crate::{EventBus, EventBusError, Message, MessageHandler, Result};

/// In-process event transport.
///
/// Each publish spawns one tokio task per listener registered on the topic
/// at that moment, so a slow listener never delays the publisher or the
/// other listeners. Nothing is persisted and nothing is replayed to late
/// subscribers.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<MessageHandler>>>>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of listeners registered on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.handlers
            .read()
            .await
            .get(topic)
            .map_or(0, |handlers| handlers.len())
    }

    /// Returns every topic with at least one listener, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()> {
        if message.is_empty() {
            return Err(EventBusError::EmptyMessage {
                topic: topic.to_string(),
            });
        }

        // Snapshot the listeners so the read lock is not held while spawning.
        let handlers = match self.handlers.read().await.get(topic) {
            Some(handlers) => handlers.clone(),
            None => Vec::new(),
        };

        if handlers.is_empty() {
            tracing::debug!(topic, "no listeners registered, message dropped");
            return Ok(());
        }

        tracing::debug!(topic, listeners = handlers.len(), "publishing message");
        metrics::counter!("event_bus_messages_published_total").increment(1);

        let message: Message = Arc::from(message);
        for handler in handlers {
            let delivery = handler(Arc::clone(&message));
            tokio::spawn(delivery.in_current_span());
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) {
        tracing::debug!(topic, "registering listener");
        self.handlers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(handler);
    }
}
