// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Capability interface shared by device and pinned pools.

use crate::backend::QueueId;

use super::allocation::Allocation;
use super::error::PoolError;
use super::pinned::PinnedMemoryPool;
use super::pool::MemoryPool;
use super::stats::PoolStats;

/// A caching allocator the runtime layer can allocate from without knowing
/// which kind of memory backs it.
pub trait MemoryResource: Send + Sync {
    fn allocate(&self, size: usize, queue: QueueId) -> Result<Allocation, PoolError>;
    fn free(&self, allocation: &Allocation, queue: QueueId) -> Result<(), PoolError>;
    fn free_all_blocks(&self) -> Result<usize, PoolError>;
    fn set_limit(&self, limit: Option<usize>);
    fn stats(&self) -> PoolStats;
}

impl MemoryResource for MemoryPool {
    fn allocate(&self, size: usize, queue: QueueId) -> Result<Allocation, PoolError> {
        MemoryPool::allocate(self, size, queue)
    }

    fn free(&self, allocation: &Allocation, queue: QueueId) -> Result<(), PoolError> {
        MemoryPool::free(self, allocation, queue)
    }

    fn free_all_blocks(&self) -> Result<usize, PoolError> {
        MemoryPool::free_all_blocks(self)
    }

    fn set_limit(&self, limit: Option<usize>) {
        MemoryPool::set_limit(self, limit)
    }

    fn stats(&self) -> PoolStats {
        MemoryPool::stats(self)
    }
}

/// Host memory has no queue affinity; the queue argument is ignored.
impl MemoryResource for PinnedMemoryPool {
    fn allocate(&self, size: usize, _queue: QueueId) -> Result<Allocation, PoolError> {
        PinnedMemoryPool::allocate(self, size)
    }

    fn free(&self, allocation: &Allocation, _queue: QueueId) -> Result<(), PoolError> {
        PinnedMemoryPool::free(self, allocation)
    }

    fn free_all_blocks(&self) -> Result<usize, PoolError> {
        PinnedMemoryPool::free_all_blocks(self)
    }

    fn set_limit(&self, limit: Option<usize>) {
        PinnedMemoryPool::set_limit(self, limit)
    }

    fn stats(&self) -> PoolStats {
        PinnedMemoryPool::stats(self)
    }
}
