// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Pool metrics via the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};

use crate::memory::PoolStats;

/// Publish reservation gauges for `pool`.
pub fn record_pool_stats(pool: &str, stats: &PoolStats) {
    gauge!("gg_mempool_reserved_bytes", "pool" => pool.to_string()).set(stats.reserved_total as f64);
    gauge!("gg_mempool_allocated_bytes", "pool" => pool.to_string()).set(stats.allocated_total as f64);
    gauge!("gg_mempool_free_blocks", "pool" => pool.to_string()).set(stats.n_free_blocks as f64);
}

pub fn record_cache_hit(pool: &str) {
    counter!("gg_mempool_cache_hits_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_cache_miss(pool: &str) {
    counter!("gg_mempool_cache_misses_total", "pool" => pool.to_string()).increment(1);
}

/// Queue-ordering dependencies inserted to reuse a chunk across queues.
pub fn record_stream_waits(pool: &str, waits: usize) {
    if waits > 0 {
        counter!("gg_mempool_stream_waits_total", "pool" => pool.to_string()).increment(waits as u64);
    }
}

pub fn record_eviction(pool: &str, segments: usize, bytes: usize) {
    counter!("gg_mempool_evictions_total", "pool" => pool.to_string()).increment(segments as u64);
    counter!("gg_mempool_evicted_bytes_total", "pool" => pool.to_string()).increment(bytes as u64);
}

pub fn record_out_of_memory(pool: &str) {
    counter!("gg_mempool_oom_total", "pool" => pool.to_string()).increment(1);
}
