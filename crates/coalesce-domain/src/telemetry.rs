//! Metric names and registration.

/// Cache reads served from the cache.
pub const CACHE_HITS_TOTAL: &str = "coalesce_cache_hits_total";
/// Cache reads that fell through to the network path.
pub const CACHE_MISSES_TOTAL: &str = "coalesce_cache_misses_total";
/// Bulk calls issued.
pub const BATCHES_DISPATCHED_TOTAL: &str = "coalesce_batches_dispatched_total";
/// Bulk calls whose transport failed.
pub const BATCH_FAILURES_TOTAL: &str = "coalesce_batch_failures_total";
/// Items that failed inside a successful batch.
pub const ITEMS_FAILED_TOTAL: &str = "coalesce_items_failed_total";
/// Lookups that joined an operation already in flight.
pub const DEDUP_JOINS_TOTAL: &str = "coalesce_dedup_joins_total";
/// Size of dispatched batches.
pub const BATCH_SIZE: &str = "coalesce_batch_size";

/// Registers metric descriptions with the installed recorder.
///
/// Optional; call once during application startup.
pub fn register_metrics() {
    metrics::describe_counter!(CACHE_HITS_TOTAL, "Total number of cache hits");
    metrics::describe_counter!(CACHE_MISSES_TOTAL, "Total number of cache misses");
    metrics::describe_counter!(
        BATCHES_DISPATCHED_TOTAL,
        "Total number of bulk calls dispatched"
    );
    metrics::describe_counter!(
        BATCH_FAILURES_TOTAL,
        "Total number of bulk calls that failed at the transport level"
    );
    metrics::describe_counter!(
        ITEMS_FAILED_TOTAL,
        "Total number of items that failed inside a successful batch"
    );
    metrics::describe_counter!(
        DEDUP_JOINS_TOTAL,
        "Total number of lookups that joined an in-flight operation"
    );
    metrics::describe_histogram!(BATCH_SIZE, "Number of items per dispatched batch");
}
