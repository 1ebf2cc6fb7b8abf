// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Device memory pool with stream-ordered reuse.
//!
//! Freed chunks are cached instead of being returned to the driver. A chunk
//! freed on one queue can be handed to another queue right away: the pool
//! either proves the earlier use complete (non-blocking poll) or makes the new
//! queue wait on the recorded event. The caller's thread is never blocked on
//! the hot path.

use std::sync::Arc;

use serde::Deserialize;

use super::allocation::Allocation;
use super::arena::ChunkInfo;
use super::caching::CachingPool;
use super::error::PoolError;
use super::limits::LimitSpec;
use super::size_class::DEFAULT_GRANULARITY;
use super::stats::PoolStats;
use crate::backend::{DeviceId, QueueId, QueueRuntime, RawAllocator};

/// Configuration shared by device and pinned pools.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Allocation granularity in bytes (rounded up to a power of two).
    pub granularity: usize,
    /// Free chunks examined per allocation. `None` (or `Some(0)`) scans every
    /// candidate, `Some(1)` is first-fit.
    pub search_window: Option<usize>,
    /// Over-allocation factor for new segments (>= 1.0).
    pub growth_factor: f64,
    /// Cap on reserved bytes.
    pub limit: Option<LimitSpec>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            granularity: DEFAULT_GRANULARITY,
            search_window: Some(16),
            growth_factor: 1.0,
            limit: None,
        }
    }
}

impl PoolConfig {
    /// Scan every free candidate before growing.
    pub fn exhaustive() -> Self {
        Self { search_window: None, ..Default::default() }
    }

    /// Take the best-fit candidate without looking further.
    pub fn first_fit() -> Self {
        Self { search_window: Some(1), ..Default::default() }
    }

    pub fn with_limit(mut self, limit: LimitSpec) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Caching allocator for one device.
pub struct MemoryPool {
    device: DeviceId,
    core: CachingPool,
}

impl MemoryPool {
    pub fn new(
        device: DeviceId,
        allocator: Arc<dyn RawAllocator>,
        queues: Arc<dyn QueueRuntime>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        let core = CachingPool::new(device.to_string(), Some(device), allocator, Some(queues), &config)?;
        Ok(Self { device, core })
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn granularity(&self) -> usize {
        self.core.granularity()
    }

    /// Allocate at least `size` bytes for use on `queue`.
    pub fn allocate(&self, size: usize, queue: QueueId) -> Result<Allocation, PoolError> {
        self.core.allocate(size, Some(queue))
    }

    /// Return `allocation` to the cache. Work already enqueued on `queue` may
    /// keep using the memory; reuse elsewhere is ordered after it.
    pub fn free(&self, allocation: &Allocation, queue: QueueId) -> Result<(), PoolError> {
        self.core.free(allocation, Some(queue))
    }

    /// Synchronize with outstanding uses and release every wholly free segment.
    pub fn free_all_blocks(&self) -> Result<usize, PoolError> {
        self.core.free_all_blocks()
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        self.core.set_limit(limit)
    }

    /// Limit as a fraction of the device's total memory.
    pub fn set_limit_fraction(&self, fraction: f64) -> Result<usize, PoolError> {
        self.core.set_limit_spec(LimitSpec::Fraction(fraction))
    }

    pub fn set_limit_spec(&self, spec: LimitSpec) -> Result<usize, PoolError> {
        self.core.set_limit_spec(spec)
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.core.limit()
    }

    pub fn stats(&self) -> PoolStats {
        self.core.stats()
    }

    pub fn used_bytes(&self) -> usize {
        self.stats().allocated_total
    }

    pub fn free_bytes(&self) -> usize {
        self.stats().free_bytes()
    }

    pub fn total_bytes(&self) -> usize {
        self.stats().reserved_total
    }

    pub fn n_free_blocks(&self) -> usize {
        self.stats().n_free_blocks
    }

    /// Every chunk in address order.
    pub fn chunks(&self) -> Vec<ChunkInfo> {
        self.core.chunks()
    }

    /// Check arena invariants; `Err` describes the first violation found.
    pub fn verify(&self) -> Result<(), String> {
        self.core.verify()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
