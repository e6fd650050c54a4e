//! Resolved value caching with TTL, size bound and eviction hook.
//!
//! The default [`CacheStore`] is backed by Moka's async cache, which gives
//! lock-free concurrent reads and built-in TTL and size based eviction.
//!
//! # Existence Metadata
//!
//! Every entry records whether the key resolved (`exists = true`) or was
//! confirmed absent (`exists = false`). Negative entries are cached so a
//! caller can tell "confirmed absent" from "not yet looked up".
//!
//! A positive entry is never downgraded by a negative write. It is replaced
//! only by a newer positive resolution, by eviction, or by an explicit
//! invalidation.
//!
//! # Example
//!
//! ```rust,ignore
//! use coalesce_domain::cache::{CacheEntry, CacheStore, CacheStoreConfig, MokaCacheStore};
//!
//! let cache = MokaCacheStore::new(CacheStoreConfig::default());
//! cache.put(CacheEntry::new("uuid1-80".into(), "https://cdn/a.png", true)).await;
//!
//! assert!(cache.get(&"uuid1-80".into()).await.is_some());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute::Op;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::fingerprint::Fingerprint;
use crate::telemetry::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

/// A cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// Fingerprint of the key this entry resolves.
    pub key: Fingerprint,
    /// The resolved value.
    pub value: V,
    /// `false` for a confirmed negative lookup.
    pub exists: bool,
    /// When the entry was created.
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Creates a new entry stamped with the current time.
    pub fn new(key: Fingerprint, value: V, exists: bool) -> Self {
        Self {
            key,
            value,
            exists,
            inserted_at: Instant::now(),
        }
    }
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The entry outlived its TTL.
    Expired,
    /// The entry was removed to respect the size bound.
    Size,
    /// The entry was overwritten by a newer resolution.
    Replaced,
    /// The entry was removed by `invalidate` or `invalidate_all`.
    Invalidated,
}

impl From<RemovalCause> for EvictionReason {
    fn from(cause: RemovalCause) -> Self {
        match cause {
            RemovalCause::Expired => Self::Expired,
            RemovalCause::Size => Self::Size,
            RemovalCause::Replaced => Self::Replaced,
            RemovalCause::Explicit => Self::Invalidated,
        }
    }
}

/// Called for every entry that leaves the cache.
pub trait EvictionHook<V>: Send + Sync + 'static {
    fn on_evict(&self, entry: &CacheEntry<V>, reason: EvictionReason);
}

/// Storage for resolved key/value mappings.
#[async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the entry for `key`, if present and not expired.
    async fn get(&self, key: &Fingerprint) -> Option<CacheEntry<V>>;

    /// Stores an entry. A negative entry does not overwrite a positive one.
    async fn put(&self, entry: CacheEntry<V>);

    /// Removes the entry for `key`.
    async fn invalidate(&self, key: &Fingerprint);

    /// Removes every entry.
    async fn invalidate_all(&self);

    /// Approximate number of entries.
    fn entry_count(&self) -> u64;
}

/// Sizing and lifetime settings for [`MokaCacheStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStoreConfig {
    /// Maximum number of entries.
    pub max_capacity: u64,
    /// Entry lifetime; `None` disables TTL expiry.
    pub ttl: Option<Duration>,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: None,
        }
    }
}

impl CacheStoreConfig {
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl From<&LoaderConfig> for CacheStoreConfig {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            max_capacity: config.cache_max_capacity,
            ttl: config.cache_ttl(),
        }
    }
}

/// Moka backed [`CacheStore`].
pub struct MokaCacheStore<V> {
    cache: Cache<Fingerprint, CacheEntry<V>>,
    config: CacheStoreConfig,
}

impl<V> std::fmt::Debug for MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStore")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl<V> MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store without an eviction hook.
    pub fn new(config: CacheStoreConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a store that reports every removal to `hook`.
    pub fn with_eviction_hook(config: CacheStoreConfig, hook: Arc<dyn EvictionHook<V>>) -> Self {
        Self::build(config, Some(hook))
    }

    fn build(config: CacheStoreConfig, hook: Option<Arc<dyn EvictionHook<V>>>) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        if let Some(hook) = hook {
            builder = builder.eviction_listener(
                move |_key: Arc<Fingerprint>, entry: CacheEntry<V>, cause: RemovalCause| {
                    hook.on_evict(&entry, cause.into());
                },
            );
        }

        Self {
            cache: builder.build(),
            config,
        }
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    /// Runs pending maintenance tasks such as expiry and eviction
    /// notifications. Useful for testing TTL behavior.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &Fingerprint) -> Option<CacheEntry<V>> {
        let entry = self.cache.get(key).await;
        if entry.is_some() {
            metrics::counter!(CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(CACHE_MISSES_TOTAL).increment(1);
        }
        entry
    }

    async fn put(&self, entry: CacheEntry<V>) {
        // Check-and-write runs under the entry lock so a concurrent negative
        // write cannot slip in over a positive one.
        let _ = self
            .cache
            .entry(entry.key.clone())
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if current.value().exists && !entry.exists => {
                        debug!(key = %entry.key, "keeping positive entry over negative resolution");
                        Op::Nop
                    }
                    _ => Op::Put(entry),
                };
                std::future::ready(op)
            })
            .await;
    }

    async fn invalidate(&self, key: &Fingerprint) {
        self.cache.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
