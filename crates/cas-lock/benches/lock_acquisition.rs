//! Benchmarks for lock acquisition latency

use std::sync::Arc;
use std::time::Duration;

use cas_lock::{FailClosedClient, FailOpenClient};
use cas_lock_memory::MemoryLockStore;
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_fail_closed_acquisition(c: &mut Criterion) {
    let store = Arc::new(MemoryLockStore::new());
    let client = FailClosedClient::builder(store)
        .acquire_period(Duration::from_millis(1))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("fail_closed");
    group.bench_function("acquire_release", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(handle) = client.acquire("bench-lock").await {
                    let _ = handle.release().await;
                }
            });
    });
    group.finish();
}

fn bench_fail_open_acquisition(c: &mut Criterion) {
    let store = Arc::new(MemoryLockStore::new());
    let client = FailOpenClient::builder(store)
        .lease_duration(Duration::from_secs(10))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("fail_open");
    group.bench_function("acquire_release", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(handle) = client.acquire("bench-lock").await {
                    let _ = handle.release().await;
                }
            });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_fail_closed_acquisition,
    bench_fail_open_acquisition
);
criterion_main!(benches);
