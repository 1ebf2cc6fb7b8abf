//! Allocation throughput benchmarks.
//!
//! Measures cached reuse on one queue, reuse across queues, and a mixed-size
//! churn workload at both search-window extremes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gg_mempool::backend::{DeviceId, MockDevice, QueueId};
use gg_mempool::memory::{MemoryPool, PinnedMemoryPool, PoolConfig};

fn device_pool(config: PoolConfig) -> (Arc<MockDevice>, MemoryPool) {
    let dev = Arc::new(MockDevice::new(1 << 32, 0).with_auto_complete());
    let pool = MemoryPool::new(DeviceId(0), dev.clone(), dev.clone(), config).unwrap();
    (dev, pool)
}

fn bench_cached_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_reuse");
    group.throughput(Throughput::Elements(1));

    for (name, size) in [("4kb", 4096usize), ("1mb", 1 << 20)] {
        let (dev, pool) = device_pool(PoolConfig::default());
        group.bench_function(BenchmarkId::new("same_queue", name), |b| {
            b.iter_batched(
                || dev.clear_calls(),
                |_| {
                    let a = pool.allocate(black_box(size), QueueId(1)).unwrap();
                    pool.free(&a, QueueId(1)).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        let (dev, pool) = device_pool(PoolConfig::default());
        group.bench_function(BenchmarkId::new("cross_queue", name), |b| {
            let mut q = 0u64;
            b.iter_batched(
                || dev.clear_calls(),
                |_| {
                    q = q % 4 + 1;
                    let a = pool.allocate(black_box(size), QueueId(q)).unwrap();
                    pool.free(&a, QueueId(q)).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    let pinned = PinnedMemoryPool::with_host_allocator(PoolConfig::default()).unwrap();
    group.bench_function("pinned_64kb", |b| {
        b.iter(|| {
            let a = pinned.allocate(black_box(64 * 1024)).unwrap();
            pinned.free(&a).unwrap();
        })
    });

    group.finish();
}

fn bench_mixed_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_churn");

    for (name, config) in [("exhaustive", PoolConfig::exhaustive()), ("first_fit", PoolConfig::first_fit())] {
        let (dev, pool) = device_pool(config);
        let mut rng = StdRng::seed_from_u64(0x6d656d);
        let mut live = Vec::with_capacity(64);

        group.bench_function(name, |b| {
            b.iter_batched(
                || dev.clear_calls(),
                |_| {
                    if live.len() < 64 && rng.gen_bool(0.6) {
                        let size = rng.gen_range(256..256 * 1024);
                        live.push(pool.allocate(size, QueueId(rng.gen_range(1..4))).unwrap());
                    } else if !live.is_empty() {
                        let a = live.swap_remove(rng.gen_range(0..live.len()));
                        pool.free(&a, QueueId(1)).unwrap();
                    }
                },
                BatchSize::SmallInput,
            )
        });

        for a in live.drain(..) {
            pool.free(&a, QueueId(1)).unwrap();
        }
    }

    group.finish();
}

criterion_group!(benches, bench_cached_reuse, bench_mixed_churn);
criterion_main!(benches);
