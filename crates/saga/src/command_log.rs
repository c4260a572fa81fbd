//! Audit log of commands that could not be delivered.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::CommandEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome recorded for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a command log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandLogError {
    #[error("Command log unavailable: {0}")]
    Unavailable(String),
}

/// Persists commands for later inspection or replay.
///
/// Only failures are recorded. Callers treat a save as best effort.
#[async_trait]
pub trait CommandLog: Send + Sync {
    async fn save(
        &self,
        status: CommandStatus,
        envelope: &CommandEvent,
        payload: &serde_json::Value,
    ) -> Result<(), CommandLogError>;
}

#[async_trait]
impl<T: CommandLog + ?Sized> CommandLog for Arc<T> {
    async fn save(
        &self,
        status: CommandStatus,
        envelope: &CommandEvent,
        payload: &serde_json::Value,
    ) -> Result<(), CommandLogError> {
        (**self).save(status, envelope, payload).await
    }
}

/// One record in the command log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub status: CommandStatus,
    pub envelope: CommandEvent,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct InMemoryCommandLogState {
    entries: Vec<CommandLogEntry>,
    fail_on_save: bool,
}

/// In-memory command log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandLog {
    state: Arc<RwLock<InMemoryCommandLogState>>,
}

impl InMemoryCommandLog {
    /// Creates an empty command log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_save = fail;
    }

    /// Returns a copy of every recorded entry, oldest first.
    pub fn entries(&self) -> Vec<CommandLogEntry> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CommandLog for InMemoryCommandLog {
    async fn save(
        &self,
        status: CommandStatus,
        envelope: &CommandEvent,
        payload: &serde_json::Value,
    ) -> Result<(), CommandLogError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_save {
            return Err(CommandLogError::Unavailable(
                "command log rejected the write".to_string(),
            ));
        }

        tracing::info!(
            %status,
            event_type = %envelope.event_type,
            trace_id = %envelope.trace_id(),
            deduplication_id = %envelope.deduplication_id(),
            "command recorded"
        );

        state.entries.push(CommandLogEntry {
            status,
            envelope: envelope.clone(),
            payload: payload.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
