//! coalesce-domain: Batching, deduplication and caching engine
//!
//! This crate turns many small, individually requested lookups into bulk
//! network calls while keeping per-item success and failure semantics:
//! - Fingerprinting of requests and responses
//! - Singleflight deduplication of concurrent lookups
//! - Size and time bounded batch scheduling
//! - Per-item demultiplexing of bulk responses
//! - Resolved value caching with negative entries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               coalesce-domain               │
//! ├─────────────────────────────────────────────┤
//! │  loader/       - Lookup facade              │
//! │  singleflight  - In-flight dedup gate       │
//! │  scheduler     - Batch window scheduling    │
//! │  executor      - Bulk call execution        │
//! │  matcher       - Response demultiplexing    │
//! │  cache/        - Resolved value caching     │
//! │  source        - Network collaborator seam  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod loader;
pub mod matcher;
pub mod scheduler;
pub mod singleflight;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at the crate root
pub use cache::{CacheEntry, CacheStore, CacheStoreConfig, EvictionHook, EvictionReason, MokaCacheStore};
pub use config::{LoaderConfig, LookupOptions};
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingDiagnosticSink, TracingDiagnosticSink};
pub use error::{ConfigError, ItemFailure, LookupError, LookupResult, TransportError, ValidationError};
pub use fingerprint::{Fingerprint, Fingerprinted};
pub use loader::{Loader, LoaderBuilder};
pub use source::BulkSource;
pub use telemetry::register_metrics;
pub use types::{BatchOutcome, Origin, RequestItem, Resolved};
