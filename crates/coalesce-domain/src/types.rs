//! Data types shared by the scheduler, executor and matcher.

use std::time::Instant;

use crate::error::{ItemFailure, LookupError, LookupResult, TransportError};
use crate::fingerprint::{Fingerprint, Fingerprinted};

/// A single lookup waiting to be sent in a batch.
///
/// Immutable once created; owned by the scheduler until its batch is
/// flushed, then by the executor.
#[derive(Debug, Clone)]
pub struct RequestItem<K> {
    key: K,
    fingerprint: Fingerprint,
    created_at: Instant,
}

impl<K: Fingerprinted> RequestItem<K> {
    /// Creates an item, deriving its fingerprint from the key.
    pub fn new(key: K) -> Self {
        let fingerprint = key.fingerprint();
        Self::with_fingerprint(key, fingerprint)
    }
}

impl<K> RequestItem<K> {
    /// Creates an item with an already computed fingerprint.
    pub fn with_fingerprint(key: K, fingerprint: Fingerprint) -> Self {
        Self {
            key,
            fingerprint,
            created_at: Instant::now(),
        }
    }

    /// The normalized request payload.
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// When the item was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn into_key(self) -> K {
        self.key
    }
}

/// Per-item outcome of a dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome<V> {
    /// The item resolved to a value.
    Fulfilled(V),
    /// The transport succeeded but this item could not be resolved.
    ItemFailed(ItemFailure),
    /// The transport call failed for the whole batch.
    BatchFailed(TransportError),
}

impl<V> BatchOutcome<V> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Converts the outcome into a caller-facing result.
    pub fn into_result(self, fingerprint: &Fingerprint) -> LookupResult<V> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::ItemFailed(reason) => Err(LookupError::ItemFailed {
                fingerprint: fingerprint.clone(),
                reason,
            }),
            Self::BatchFailed(reason) => Err(LookupError::BatchFailed { reason }),
        }
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Network,
}

/// A value handed back to a lookup caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<V> {
    /// The resolved value.
    pub value: V,
    /// `false` when the key is confirmed not to resolve.
    pub exists: bool,
    /// Whether the value was served from cache or fetched.
    pub origin: Origin,
}

impl<V> Resolved<V> {
    pub fn is_cached(&self) -> bool {
        self.origin == Origin::Cache
    }
}
