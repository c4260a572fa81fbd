//! In-memory record of every payment's saga.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{DeduplicationId, PaymentId, WalletId};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::state::SagaStep;

/// What the saga last learned about a payment from an inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentContext {
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub currency: String,
    pub token: Option<String>,
}

/// Progress of one payment's saga.
#[derive(Debug, Clone)]
pub struct SagaRecord {
    payment_id: PaymentId,
    step: SagaStep,
    history: Vec<SagaStep>,
    context: Option<PaymentContext>,
    processed: HashSet<DeduplicationId>,
    updated_at: DateTime<Utc>,
}

impl SagaRecord {
    fn new(payment_id: PaymentId) -> Self {
        Self {
            payment_id,
            step: SagaStep::Created,
            history: Vec::new(),
            context: None,
            processed: HashSet::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    /// Returns the current step.
    pub fn step(&self) -> SagaStep {
        self.step
    }

    /// Returns every step entered so far, oldest first.
    pub fn history(&self) -> &[SagaStep] {
        &self.history
    }

    pub fn context(&self) -> Option<&PaymentContext> {
        self.context.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if no event has been handled for this payment yet.
    pub fn is_fresh(&self) -> bool {
        self.history.is_empty()
    }

    /// Returns true if an event with this id has been applied.
    pub fn has_processed(&self, id: &DeduplicationId) -> bool {
        self.processed.contains(id)
    }

    /// Returns the number of applied events.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub(crate) fn enter(&mut self, step: SagaStep) {
        if self.history.last() != Some(&step) {
            self.history.push(step);
        }
        self.step = step;
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_processed(&mut self, id: DeduplicationId) {
        self.processed.insert(id);
    }

    /// Merges what a payload tells about the payment, keeping a known token.
    pub(crate) fn remember(&mut self, mut context: PaymentContext) {
        if context.token.is_none() {
            context.token = self.context.as_ref().and_then(|c| c.token.clone());
        }
        self.context = Some(context);
    }
}

/// How an inbound event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The reaction ran and the saga reached this step.
    Applied(SagaStep),
    /// The event had already been applied; nothing was issued.
    Duplicate,
    /// The event is not valid from the saga's current step; nothing was issued.
    Ignored { step: SagaStep },
    /// The event type is not one the saga consumes; no handler ran.
    Unknown,
}

/// Saga records keyed by payment id.
///
/// Each record sits behind its own mutex. A handler holds it for the whole
/// reaction, which serializes events for one payment while different
/// payments proceed in parallel. Records live only as long as the process.
///
/// Records and their processed deduplication ids are never evicted, even
/// once a saga is `Notified`, so a late redelivery of any event it handled
/// is still recognized as a duplicate. Memory therefore grows with the
/// number of payments seen.
#[derive(Debug, Clone, Default)]
pub struct SagaStore {
    records: Arc<RwLock<HashMap<PaymentId, Arc<Mutex<SagaRecord>>>>>,
}

impl SagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a payment, creating it on first use.
    pub async fn record(&self, payment_id: &PaymentId) -> Arc<Mutex<SagaRecord>> {
        if let Some(record) = self.records.read().await.get(payment_id) {
            return Arc::clone(record);
        }
        let mut records = self.records.write().await;
        Arc::clone(
            records
                .entry(payment_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(SagaRecord::new(payment_id.clone())))),
        )
    }

    /// Returns a copy of a payment's record, if any event was seen for it.
    pub async fn snapshot(&self, payment_id: &PaymentId) -> Option<SagaRecord> {
        let record = self.records.read().await.get(payment_id).cloned()?;
        let record = record.lock().await;
        Some(record.clone())
    }

    /// Returns the current step of a payment's saga.
    pub async fn step(&self, payment_id: &PaymentId) -> Option<SagaStep> {
        self.snapshot(payment_id).await.map(|record| record.step())
    }

    /// Returns every saga whose outcome is not decided yet, by payment id.
    ///
    /// A saga stuck after a failed command shows up here.
    pub async fn unsettled(&self) -> Vec<SagaRecord> {
        let records: Vec<_> = self.records.read().await.values().cloned().collect();
        let mut unsettled = Vec::new();
        for record in records {
            let record = record.lock().await;
            if !record.step().is_settled() {
                unsettled.push(record.clone());
            }
        }
        unsettled.sort_by(|a, b| a.payment_id.cmp(&b.payment_id));
        unsettled
    }

    /// Returns the number of payments tracked.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
