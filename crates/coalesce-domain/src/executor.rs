//! Bulk executor: one network call per flushed batch.
//!
//! A transport failure resolves every item with the same
//! [`BatchOutcome::BatchFailed`] reason and leaves the cache untouched.
//! A successful call is demultiplexed by the matcher; fulfilled items are
//! written to the cache before their callers are notified. The executor
//! never retries.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::diagnostics::DiagnosticSink;
use crate::matcher;
use crate::scheduler::{BatchDispatcher, PendingItem};
use crate::source::BulkSource;
use crate::telemetry::{BATCHES_DISPATCHED_TOTAL, BATCH_FAILURES_TOTAL, BATCH_SIZE};
use crate::types::{BatchOutcome, RequestItem};

/// Executes batches against a [`BulkSource`].
pub struct BulkExecutor<S: BulkSource> {
    source: Arc<S>,
    cache: Arc<dyn CacheStore<S::Response>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<S: BulkSource> BulkExecutor<S> {
    pub fn new(
        source: Arc<S>,
        cache: Arc<dyn CacheStore<S::Response>>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            source,
            cache,
            diagnostics,
        }
    }

    /// Sends one batch and returns one outcome per item, in item order.
    pub async fn execute(&self, items: &[RequestItem<S::Key>]) -> Vec<BatchOutcome<S::Response>> {
        let keys: Vec<S::Key> = items.iter().map(|item| item.key().clone()).collect();

        metrics::counter!(BATCHES_DISPATCHED_TOTAL).increment(1);
        metrics::histogram!(BATCH_SIZE).record(keys.len() as f64);
        debug!(size = keys.len(), "submitting batch");

        match self.source.bulk_submit(&keys).await {
            Ok(responses) => {
                matcher::match_responses(self.source.as_ref(), items, responses, self.diagnostics.as_ref())
            }
            Err(reason) => {
                metrics::counter!(BATCH_FAILURES_TOTAL).increment(1);
                warn!(size = items.len(), error = %reason, "bulk submit failed");
                items
                    .iter()
                    .map(|_| BatchOutcome::BatchFailed(reason.clone()))
                    .collect()
            }
        }
    }

    /// Writes a fulfilled outcome to the cache.
    pub(crate) async fn record(&self, item: &RequestItem<S::Key>, outcome: &BatchOutcome<S::Response>) {
        if let BatchOutcome::Fulfilled(value) = outcome {
            let exists = self.source.exists(value);
            self.cache
                .put(CacheEntry::new(item.fingerprint().clone(), value.clone(), exists))
                .await;
        }
    }
}

#[async_trait]
impl<S: BulkSource> BatchDispatcher<S::Key, BatchOutcome<S::Response>> for BulkExecutor<S> {
    async fn dispatch(&self, batch: Vec<PendingItem<S::Key, BatchOutcome<S::Response>>>) {
        let (items, replies): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .map(|pending| (pending.item, pending.reply))
            .unzip();

        let outcomes = self.execute(&items).await;

        for ((item, reply), outcome) in items.iter().zip(replies).zip(outcomes) {
            self.record(item, &outcome).await;
            if reply.send(outcome).is_err() {
                debug!(fingerprint = %item.fingerprint(), "caller went away before batch settled");
            }
        }
    }
}
