//! Loader: the lookup facade over the batching engine.
//!
//! A lookup flows through the stages below:
//!
//! 1. **Validation**: the source normalizes and validates the key; invalid
//!    keys are rejected before any shared state is touched
//! 2. **Singleflight**: a lookup of a fingerprint already in flight joins
//!    that operation
//! 3. **Cache**: unless the caller forces a bypass, a cached entry
//!    (positive or negative) short-circuits the network path
//! 4. **Batching**: the leader enqueues its item into the active batch,
//!    which is flushed by size or by the batch window
//!
//! Each caller receives its own per-item result; one item's failure never
//! fails its siblings.
//!
//! # Example
//!
//! ```rust,ignore
//! use coalesce_domain::{Loader, LoaderConfig};
//!
//! let loader = Loader::new(MySource::new(), LoaderConfig::default())?;
//! let resolved = loader.lookup(key).await?;
//! ```

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinError;
use tracing::warn;

use crate::cache::{CacheEntry, CacheStore, CacheStoreConfig, EvictionHook, MokaCacheStore};
use crate::config::{LoaderConfig, LookupOptions};
use crate::diagnostics::{DiagnosticSink, TracingDiagnosticSink};
use crate::error::{ConfigError, LookupError, LookupResult, TransportError};
use crate::executor::BulkExecutor;
use crate::fingerprint::{Fingerprint, Fingerprinted};
use crate::matcher;
use crate::scheduler::BatchScheduler;
use crate::singleflight::Singleflight;
use crate::source::BulkSource;
use crate::telemetry::{DEDUP_JOINS_TOTAL, ITEMS_FAILED_TOTAL};
use crate::types::{BatchOutcome, Origin, RequestItem, Resolved};

/// Result shared between callers of one in-flight operation.
type SharedResult<V> = LookupResult<Resolved<V>>;

/// Batching, deduplicating and caching lookup engine for one [`BulkSource`].
pub struct Loader<S: BulkSource> {
    source: Arc<S>,
    config: LoaderConfig,
    cache: Arc<dyn CacheStore<S::Response>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    executor: Arc<BulkExecutor<S>>,
    scheduler: BatchScheduler<S::Key, BatchOutcome<S::Response>>,
    singleflight: Singleflight<Fingerprint, SharedResult<S::Response>>,
}

impl<S: BulkSource> Loader<S> {
    /// Creates a loader with the default Moka cache and tracing diagnostics.
    pub fn new(source: S, config: LoaderConfig) -> Result<Self, ConfigError> {
        Self::builder(source, config).build()
    }

    /// Starts building a loader with custom collaborators.
    pub fn builder(source: S, config: LoaderConfig) -> LoaderBuilder<S> {
        LoaderBuilder {
            source,
            config,
            cache: None,
            diagnostics: None,
            eviction_hook: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The cache store backing this loader.
    pub fn cache(&self) -> &Arc<dyn CacheStore<S::Response>> {
        &self.cache
    }

    /// Looks up a key with default options.
    pub async fn lookup(&self, key: S::Key) -> LookupResult<Resolved<S::Response>> {
        self.lookup_with(key, LookupOptions::default()).await
    }

    /// Looks up a key, batching it with other lookups issued within the
    /// batch window.
    ///
    /// An identical lookup already in flight is joined before the cache is
    /// consulted, so a caller never sees an older cached value while a
    /// fresh resolution of the same key is under way.
    pub async fn lookup_with(
        &self,
        key: S::Key,
        options: LookupOptions,
    ) -> LookupResult<Resolved<S::Response>> {
        let (key, fingerprint) = self.admit_key(key)?;

        if let Some(mut receiver) = self.singleflight.subscribe(&fingerprint) {
            metrics::counter!(DEDUP_JOINS_TOTAL).increment(1);
            // A closed channel means the operation died; fall through.
            if let Ok(result) = receiver.recv().await {
                return result;
            }
        }

        if !options.force_bypass_cache {
            if let Some(entry) = self.cache.get(&fingerprint).await {
                return Ok(Self::from_cache(entry));
            }
        }

        let source = Arc::clone(&self.source);
        let scheduler = &self.scheduler;
        let result = self
            .singleflight
            .admit(fingerprint.clone(), || {
                // Enqueued before the first suspension point: once the gate
                // is won the item is in a batch, whatever the caller does.
                let receiver =
                    scheduler.enqueue(RequestItem::with_fingerprint(key, fingerprint.clone()));
                async move {
                    let outcome = receiver.await.map_err(|_| LookupError::Cancelled)?;
                    settle(source.as_ref(), &fingerprint, outcome)
                }
            })
            .await;
        Self::joined(result)
    }

    /// Looks up several keys concurrently. Results are in input order.
    pub async fn lookup_many<I>(&self, keys: I) -> Vec<LookupResult<Resolved<S::Response>>>
    where
        I: IntoIterator<Item = S::Key>,
    {
        join_all(keys.into_iter().map(|key| self.lookup(key))).await
    }

    /// Resolves a key immediately through the source's single-item fetch,
    /// without waiting for a batch window.
    ///
    /// The cache read path is skipped; the result is still validated by the
    /// item policy, written to the cache and shared with concurrent lookups
    /// of the same key.
    pub async fn resolve_now(&self, key: S::Key) -> LookupResult<Resolved<S::Response>> {
        let (key, fingerprint) = self.admit_key(key)?;

        let source = Arc::clone(&self.source);
        let executor = Arc::clone(&self.executor);
        let diagnostics = Arc::clone(&self.diagnostics);
        let result = self
            .singleflight
            .admit(fingerprint.clone(), move || async move {
                let item = RequestItem::with_fingerprint(key, fingerprint.clone());
                let response = match source.fetch_single(item.key()).await {
                    Ok(response) => response,
                    Err(TransportError::Unsupported { operation }) => {
                        return Err(LookupError::Unsupported { operation });
                    }
                    Err(reason) => return Err(LookupError::BatchFailed { reason }),
                };

                let outcome = matcher::classify(
                    source.as_ref(),
                    &item,
                    response.as_ref(),
                    diagnostics.as_ref(),
                );
                executor.record(&item, &outcome).await;
                settle(source.as_ref(), &fingerprint, outcome)
            })
            .await;
        Self::joined(result)
    }

    /// Removes the cached resolution of `key`.
    pub async fn invalidate(&self, key: S::Key) {
        let key = self.source.normalize(key);
        self.cache.invalidate(&key.fingerprint()).await;
    }

    /// Flushes the active batch without waiting for the window.
    pub fn flush(&self) {
        self.scheduler.flush();
    }

    /// Number of lookups waiting in the active batch.
    pub fn pending_len(&self) -> usize {
        self.scheduler.pending_len()
    }

    /// Number of fingerprints with an operation in flight.
    pub fn in_flight_count(&self) -> usize {
        self.singleflight.in_flight_count()
    }

    fn admit_key(&self, key: S::Key) -> LookupResult<(S::Key, Fingerprint)> {
        let key = self.source.normalize(key);
        self.source.validate(&key)?;
        let fingerprint = key.fingerprint();
        Ok((key, fingerprint))
    }

    fn joined(result: Result<SharedResult<S::Response>, JoinError>) -> SharedResult<S::Response> {
        result.unwrap_or_else(|err| {
            warn!(error = %err, "lookup operation did not complete");
            Err(LookupError::Cancelled)
        })
    }

    fn from_cache(entry: CacheEntry<S::Response>) -> Resolved<S::Response> {
        Resolved {
            value: entry.value,
            exists: entry.exists,
            origin: Origin::Cache,
        }
    }
}

fn settle<S: BulkSource>(
    source: &S,
    fingerprint: &Fingerprint,
    outcome: BatchOutcome<S::Response>,
) -> SharedResult<S::Response> {
    if let BatchOutcome::ItemFailed(_) = outcome {
        metrics::counter!(ITEMS_FAILED_TOTAL).increment(1);
    }
    let value = outcome.into_result(fingerprint)?;
    Ok(Resolved {
        exists: source.exists(&value),
        value,
        origin: Origin::Network,
    })
}

/// Builder for [`Loader`].
pub struct LoaderBuilder<S: BulkSource> {
    source: S,
    config: LoaderConfig,
    cache: Option<Arc<dyn CacheStore<S::Response>>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    eviction_hook: Option<Arc<dyn EvictionHook<S::Response>>>,
}

impl<S: BulkSource> LoaderBuilder<S> {
    /// Uses a custom cache store instead of the default Moka store.
    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore<S::Response>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Routes diagnostics to `sink` instead of the tracing log.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Installs an eviction hook on the default cache store.
    ///
    /// Ignored when a custom store is supplied with
    /// [`with_cache_store`](Self::with_cache_store).
    pub fn with_eviction_hook(mut self, hook: Arc<dyn EvictionHook<S::Response>>) -> Self {
        self.eviction_hook = Some(hook);
        self
    }

    /// Validates the configuration and assembles the loader.
    pub fn build(self) -> Result<Loader<S>, ConfigError> {
        self.config.validate()?;

        let cache: Arc<dyn CacheStore<S::Response>> = match (self.cache, self.eviction_hook) {
            (Some(cache), _) => cache,
            (None, Some(hook)) => Arc::new(MokaCacheStore::with_eviction_hook(
                CacheStoreConfig::from(&self.config),
                hook,
            )),
            (None, None) => Arc::new(MokaCacheStore::new(CacheStoreConfig::from(&self.config))),
        };
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingDiagnosticSink));

        let source = Arc::new(self.source);
        let executor = Arc::new(BulkExecutor::new(
            Arc::clone(&source),
            Arc::clone(&cache),
            Arc::clone(&diagnostics),
        ));
        let scheduler = BatchScheduler::new(
            self.config.max_batch_size,
            self.config.batch_window(),
            executor.clone(),
        );

        Ok(Loader {
            source,
            config: self.config,
            cache,
            diagnostics,
            executor,
            scheduler,
            singleflight: Singleflight::new(),
        })
    }
}
