//! Shared test doubles for the saga integration tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use event_bus::{EventBus, EventBusError, InMemoryEventBus, MessageHandler};
use tokio::time::Instant;

/// One call to `publish`, successful or not.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub topic: String,
    pub message: serde_json::Value,
    pub at: Instant,
    pub delivered: bool,
}

impl Attempt {
    pub fn event_type(&self) -> &str {
        self.message["event_type"].as_str().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct FlakyState {
    failing_topics: HashSet<String>,
    attempts: Vec<Attempt>,
}

/// In-memory bus that records every publish and can reject chosen topics.
#[derive(Clone, Default)]
pub struct FlakyBus {
    inner: InMemoryEventBus,
    state: Arc<Mutex<FlakyState>>,
}

impl FlakyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every publish on `topic` until healed.
    pub fn fail_topic(&self, topic: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_topics
            .insert(topic.to_string());
    }

    pub fn heal_topic(&self, topic: &str) {
        self.state.lock().unwrap().failing_topics.remove(topic);
    }

    /// Returns every publish attempt, oldest first.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Returns every publish attempt on `topic`.
    pub fn attempts_on(&self, topic: &str) -> Vec<Attempt> {
        self.attempts()
            .into_iter()
            .filter(|attempt| attempt.topic == topic)
            .collect()
    }

    /// Returns the delivered messages of one event type.
    pub fn delivered(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.attempts()
            .into_iter()
            .filter(|attempt| attempt.delivered && attempt.event_type() == event_type)
            .map(|attempt| attempt.message)
            .collect()
    }

    /// Returns the number of delivered messages of one event type.
    pub fn delivered_count(&self, event_type: &str) -> usize {
        self.delivered(event_type).len()
    }
}

#[async_trait]
impl EventBus for FlakyBus {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> event_bus::Result<()> {
        let failing = {
            let mut state = self.state.lock().unwrap();
            let failing = state.failing_topics.contains(topic);
            state.attempts.push(Attempt {
                topic: topic.to_string(),
                message: serde_json::from_slice(&message).unwrap_or_default(),
                at: Instant::now(),
                delivered: !failing,
            });
            failing
        };

        if failing {
            return Err(EventBusError::Unavailable {
                topic: topic.to_string(),
                reason: "broker unreachable".to_string(),
            });
        }
        self.inner.publish(topic, message).await
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) {
        self.inner.subscribe(topic, handler).await
    }
}
