//! Dedup gate: at most one concurrent operation per key.
//!
//! The first caller for a key becomes the leader. Its operation runs on a
//! spawned task that owns the in-flight entry, so dropping the leader's
//! future never reopens the gate while the operation is still running.
//! Callers arriving meanwhile become followers and receive a clone of the
//! result.
//!
//! # Settlement Ordering
//!
//! The in-flight entry is removed *before* the result is broadcast. A
//! caller racing with settlement therefore either subscribed before the
//! removal (and receives this result) or finds no entry and starts a fresh
//! operation. There is no window where the entry is gone but the result is
//! not yet final.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinError;

use crate::telemetry::DEDUP_JOINS_TOTAL;

type InFlightMap<K, T> = DashMap<K, broadcast::Sender<T>>;

/// Result of trying to acquire a singleflight slot.
pub enum SingleflightSlot<T> {
    /// We won the race and should execute the operation.
    /// Contains the sender to broadcast results.
    Leader(broadcast::Sender<T>),
    /// Another task is executing; wait for its result.
    Follower(broadcast::Receiver<T>),
}

/// Tracks in-flight operations keyed by `K`, sharing results of type `T`.
pub struct Singleflight<K, T>
where
    K: Hash + Eq + Clone,
{
    /// In-flight operations and the senders their results go out on.
    in_flight: Arc<InFlightMap<K, T>>,
}

impl<K, T> Singleflight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Atomically try to acquire a slot for this operation.
    ///
    /// Uses DashMap's entry API so checking for an existing operation and
    /// registering a new one cannot interleave with another caller.
    pub fn acquire(&self, key: K) -> SingleflightSlot<T> {
        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => SingleflightSlot::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                SingleflightSlot::Leader(tx)
            }
        }
    }

    /// Subscribes to the operation in flight for `key`, if there is one.
    pub fn subscribe(&self, key: &K) -> Option<broadcast::Receiver<T>> {
        self.in_flight.get(key).map(|sender| sender.subscribe())
    }

    /// Remove a settled in-flight operation.
    pub fn complete(&self, key: &K) {
        self.in_flight.remove(key);
    }

    /// Guard that removes the entry for `key` when dropped.
    pub fn guard(&self, key: K) -> SingleflightGuard<K, T> {
        SingleflightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
            completed: false,
        }
    }

    /// Number of operations currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether an operation for `key` is in flight.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }
}

impl<K, T> Singleflight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    /// Runs the future built by `factory` unless an operation for `key` is
    /// already in flight, in which case the in-flight result is awaited.
    ///
    /// `factory` is called synchronously, right after the slot is won; the
    /// future it returns runs on its own task and settles even if every
    /// caller goes away. A follower whose leader task panicked retries and
    /// may become the new leader. The leader itself gets the `JoinError`.
    pub async fn admit<F, Fut>(&self, key: K, factory: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        loop {
            match self.acquire(key.clone()) {
                SingleflightSlot::Follower(mut receiver) => {
                    metrics::counter!(DEDUP_JOINS_TOTAL).increment(1);
                    match receiver.recv().await {
                        Ok(result) => return Ok(result),
                        // Leader task died without settling; its guard
                        // already removed the entry.
                        Err(_) => continue,
                    }
                }
                SingleflightSlot::Leader(sender) => {
                    let guard = self.guard(key);
                    let operation = factory();
                    let task = tokio::spawn(async move {
                        let result = operation.await;
                        guard.complete();
                        // No receivers is fine: nobody joined.
                        let _ = sender.send(result.clone());
                        result
                    });
                    return task.await;
                }
            }
        }
    }
}

impl<K, T> Default for Singleflight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that removes the in-flight entry if the operation is dropped
/// or panics before settling.
pub struct SingleflightGuard<K, T>
where
    K: Hash + Eq,
{
    in_flight: Arc<InFlightMap<K, T>>,
    key: K,
    completed: bool,
}

impl<K, T> SingleflightGuard<K, T>
where
    K: Hash + Eq,
{
    /// Mark as completed (normal path).
    pub fn complete(mut self) {
        self.in_flight.remove(&self.key);
        self.completed = true;
    }
}

impl<K, T> Drop for SingleflightGuard<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if !self.completed {
            self.in_flight.remove(&self.key);
        }
    }
}
