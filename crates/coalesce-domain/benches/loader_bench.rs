//! Performance benchmarks for Loader deduplication and batching.
//!
//! Run with: cargo bench -p coalesce-domain
//!
//! These benchmarks measure:
//! - Throughput with varying duplicate ratios (0%, 25%, 50%, 75%)
//! - Scaling with batch size
//! - Cache hit path versus forced network path

use std::time::Duration;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use tokio::runtime::Runtime;

use coalesce_domain::{
    BulkSource, Fingerprint, Fingerprinted, Loader, LoaderConfig, LookupOptions, TransportError,
};

// =============================================================================
// Benchmark-specific source
// =============================================================================

#[derive(Clone)]
struct Echo {
    key: String,
}

impl Fingerprinted for Echo {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from(self.key.clone())
    }
}

/// In-memory source that answers every key immediately.
struct BenchSource;

#[async_trait]
impl BulkSource for BenchSource {
    type Key = String;
    type Response = Echo;

    async fn bulk_submit(&self, keys: &[String]) -> Result<Vec<Echo>, TransportError> {
        Ok(keys.iter().map(|key| Echo { key: key.clone() }).collect())
    }
}

// =============================================================================
// Setup helpers
// =============================================================================

fn create_loader(max_batch_size: usize) -> Loader<BenchSource> {
    let config = LoaderConfig::default()
        .with_max_batch_size(max_batch_size)
        .with_batch_window(Duration::from_millis(1));
    Loader::new(BenchSource, config).unwrap()
}

/// Generate keys with a specified duplicate ratio.
fn generate_keys_with_duplicates(count: usize, duplicate_ratio: f64) -> Vec<String> {
    let unique_count = ((1.0 - duplicate_ratio) * count as f64).ceil() as usize;
    let unique_count = unique_count.max(1);

    (0..count).map(|i| format!("key{}", i % unique_count)).collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

/// Benchmark concurrent lookups with varying duplicate ratios, bypassing the
/// cache so every iteration goes through singleflight and batching.
fn bench_loader_deduplication(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let count = 50;
    let loader = rt.block_on(async { create_loader(count) });

    let mut group = c.benchmark_group("loader_deduplication");
    group.throughput(Throughput::Elements(count as u64));

    for (label, ratio) in [
        ("0%_duplicates", 0.0),
        ("25%_duplicates", 0.25),
        ("50%_duplicates", 0.50),
        ("75%_duplicates", 0.75),
    ] {
        let keys = generate_keys_with_duplicates(count, ratio);

        group.bench_with_input(BenchmarkId::new("throughput", label), &keys, |b, keys| {
            b.to_async(&rt).iter(|| async {
                let results = join_all(keys.iter().map(|key| {
                    loader.lookup_with(black_box(key.clone()), LookupOptions::bypass_cache())
                }))
                .await;
                black_box(results)
            })
        });
    }

    group.finish();
}

/// Benchmark how throughput scales with the maximum batch size.
fn bench_loader_scaling(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("loader_scaling");

    for batch_size in [10, 25, 50] {
        let loader = rt.block_on(async { create_loader(batch_size) });
        let keys = generate_keys_with_duplicates(batch_size, 0.0);

        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &keys, |b, keys| {
            b.to_async(&rt).iter(|| async {
                let results = join_all(keys.iter().map(|key| {
                    loader.lookup_with(key.clone(), LookupOptions::bypass_cache())
                }))
                .await;
                black_box(results)
            })
        });
    }

    group.finish();
}

/// Benchmark the cache hit path.
fn bench_cache_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let loader = rt.block_on(async {
        let loader = create_loader(50);
        loader.lookup("warm".to_string()).await.unwrap();
        loader
    });

    c.bench_function("cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let result = loader.lookup(black_box("warm".to_string())).await;
            black_box(result)
        })
    });
}

criterion_group!(
    benches,
    bench_loader_deduplication,
    bench_loader_scaling,
    bench_cache_hits
);
criterion_main!(benches);
