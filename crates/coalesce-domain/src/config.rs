//! Loader configuration.
//!
//! Configuration is always passed in explicitly; nothing in this crate
//! reads process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Loader`](crate::loader::Loader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum number of items per dispatched batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Quiet period, measured from the first item of a batch, before the
    /// batch is flushed regardless of its size.
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,

    /// Lifetime of cache entries. `None` keeps entries until evicted by size
    /// or invalidated.
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,

    /// Maximum number of cache entries.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            batch_window_ms: default_batch_window_ms(),
            cache_ttl_ms: None,
            cache_max_capacity: default_cache_max_capacity(),
        }
    }
}

fn default_max_batch_size() -> usize {
    50
}

fn default_batch_window_ms() -> u64 {
    10
}

fn default_cache_max_capacity() -> u64 {
    10_000
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl LoaderConfig {
    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Sets the batch window.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window_ms = saturating_millis(window);
        self
    }

    /// Sets the cache entry lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = Some(saturating_millis(ttl));
        self
    }

    /// Sets the maximum number of cache entries.
    pub fn with_cache_max_capacity(mut self, capacity: u64) -> Self {
        self.cache_max_capacity = capacity;
        self
    }

    /// Returns the batch window as a [`Duration`].
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    /// Returns the cache entry lifetime, if any.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "max_batch_size must be greater than 0".to_string(),
            });
        }

        if self.cache_max_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "cache_max_capacity must be greater than 0".to_string(),
            });
        }

        if self.cache_ttl_ms == Some(0) {
            return Err(ConfigError::Invalid {
                message: "cache_ttl_ms must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

/// Per-call lookup options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Skip the cache read path and always resolve over the network.
    ///
    /// The fresh result is still written back to the cache.
    pub force_bypass_cache: bool,
}

impl LookupOptions {
    /// Options that force a fresh network resolution.
    pub fn bypass_cache() -> Self {
        Self {
            force_bypass_cache: true,
        }
    }
}
