//! Batch window scheduler.
//!
//! Accumulates request items into one active batch and flushes it when it
//! reaches `max_batch_size` or when the batch window elapses after its first
//! item was enqueued, whichever comes first.
//!
//! On flush the active batch is swapped for an empty one under the lock and
//! handed to the [`BatchDispatcher`] on a spawned task. Items enqueued after
//! the swap belong to the next batch. Enqueue order is preserved within a
//! batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::types::RequestItem;

/// An enqueued item together with the channel its outcome is delivered on.
pub struct PendingItem<K, T> {
    pub item: RequestItem<K>,
    pub reply: oneshot::Sender<T>,
}

/// Receives flushed batches.
#[async_trait]
pub trait BatchDispatcher<K, T>: Send + Sync + 'static
where
    K: Send + 'static,
    T: Send + 'static,
{
    /// Executes a batch and delivers one outcome per item.
    async fn dispatch(&self, batch: Vec<PendingItem<K, T>>);
}

struct ActiveBatch<K, T> {
    items: Vec<PendingItem<K, T>>,
    /// Incremented on every flush so a window timer armed for an earlier
    /// batch can tell it is stale.
    generation: u64,
}

impl<K, T> ActiveBatch<K, T> {
    fn take(&mut self) -> Vec<PendingItem<K, T>> {
        self.generation = self.generation.wrapping_add(1);
        std::mem::take(&mut self.items)
    }
}

struct SchedulerInner<K, T> {
    active: Mutex<ActiveBatch<K, T>>,
    max_batch_size: usize,
    batch_window: Duration,
    dispatcher: Arc<dyn BatchDispatcher<K, T>>,
}

impl<K, T> SchedulerInner<K, T>
where
    K: Send + 'static,
    T: Send + 'static,
{
    fn dispatch(&self, batch: Vec<PendingItem<K, T>>) {
        if batch.is_empty() {
            return;
        }
        debug!(size = batch.len(), "flushing batch");
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.dispatch(batch).await;
        });
    }

    fn flush_generation(&self, generation: u64) {
        let batch = {
            let mut active = self.active.lock();
            if active.generation != generation {
                return;
            }
            active.take()
        };
        self.dispatch(batch);
    }
}

/// Coalesces individual items into size or time bounded batches.
///
/// Must be used from within a Tokio runtime.
pub struct BatchScheduler<K, T> {
    inner: Arc<SchedulerInner<K, T>>,
}

impl<K, T> BatchScheduler<K, T>
where
    K: Send + 'static,
    T: Send + 'static,
{
    /// Creates a scheduler. A `max_batch_size` of 0 is treated as 1.
    pub fn new(
        max_batch_size: usize,
        batch_window: Duration,
        dispatcher: Arc<dyn BatchDispatcher<K, T>>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                active: Mutex::new(ActiveBatch {
                    items: Vec::new(),
                    generation: 0,
                }),
                max_batch_size: max_batch_size.max(1),
                batch_window,
                dispatcher,
            }),
        }
    }

    /// Appends an item to the active batch.
    ///
    /// Returns the receiving end of the item's outcome channel. Dropping it
    /// discards interest in the outcome but does not remove the item from
    /// its batch.
    pub fn enqueue(&self, item: RequestItem<K>) -> oneshot::Receiver<T> {
        let (reply, receiver) = oneshot::channel();

        let mut full_batch = None;
        let mut arm_window = None;
        {
            let mut active = self.inner.active.lock();
            active.items.push(PendingItem { item, reply });
            if active.items.len() >= self.inner.max_batch_size {
                full_batch = Some(active.take());
            } else if active.items.len() == 1 {
                arm_window = Some(active.generation);
            }
        }

        if let Some(batch) = full_batch {
            self.inner.dispatch(batch);
        }

        if let Some(generation) = arm_window {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.batch_window).await;
                inner.flush_generation(generation);
            });
        }

        receiver
    }

    /// Flushes the active batch immediately, if it has any items.
    pub fn flush(&self) {
        let batch = self.inner.active.lock().take();
        self.inner.dispatch(batch);
    }

    /// Number of items waiting in the active batch.
    pub fn pending_len(&self) -> usize {
        self.inner.active.lock().items.len()
    }

    pub fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size
    }

    pub fn batch_window(&self) -> Duration {
        self.inner.batch_window
    }
}
