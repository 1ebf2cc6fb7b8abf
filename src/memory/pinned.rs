// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Pinned (page-locked) host memory pool.
//!
//! Same chunk/size-class structure as the device pool, without queue tags:
//! host frees are only issued once the host is done with the buffer, so a
//! freed chunk is reusable immediately.

use std::sync::Arc;

use super::allocation::Allocation;
use super::arena::ChunkInfo;
use super::caching::CachingPool;
use super::error::PoolError;
use super::limits::LimitSpec;
use super::pool::PoolConfig;
use super::stats::PoolStats;
use crate::backend::{HostAllocator, RawAllocator};

/// Caching allocator for host staging buffers.
pub struct PinnedMemoryPool {
    core: CachingPool,
}

impl PinnedMemoryPool {
    pub fn new(allocator: Arc<dyn RawAllocator>, config: PoolConfig) -> Result<Self, PoolError> {
        let core = CachingPool::new("pinned".to_string(), None, allocator, None, &config)?;
        Ok(Self { core })
    }

    /// Pool over the process heap, for hosts without a page-locking backend.
    pub fn with_host_allocator(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(Arc::new(HostAllocator::new()), config)
    }

    pub fn allocate(&self, size: usize) -> Result<Allocation, PoolError> {
        self.core.allocate(size, None)
    }

    pub fn free(&self, allocation: &Allocation) -> Result<(), PoolError> {
        self.core.free(allocation, None)
    }

    /// Release every wholly free segment to the raw allocator.
    pub fn free_all_blocks(&self) -> Result<usize, PoolError> {
        self.core.free_all_blocks()
    }

    pub fn n_free_blocks(&self) -> usize {
        self.core.stats().n_free_blocks
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        self.core.set_limit(limit)
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

    pub fn chunks(&self) -> Vec<ChunkInfo> {
        self.core.chunks()
    }

    pub fn verify(&self) -> Result<(), String> {
        self.core.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockDevice;

    fn pinned_on(dev: &Arc<MockDevice>) -> PinnedMemoryPool {
        PinnedMemoryPool::new(dev.clone(), PoolConfig::default()).unwrap()
    }

    #[test]
    fn freed_chunk_is_reused_immediately() {
        let dev = Arc::new(MockDevice::new(1 << 20, 0));
        let pool = pinned_on(&dev);
        let a = pool.allocate(700).unwrap();
        assert_eq!(a.size, 1024);
        assert_eq!(a.device, None);
        pool.free(&a).unwrap();
        let b = pool.allocate(1024).unwrap();
        assert_eq!(a.ptr, b.ptr);
        assert_eq!(dev.alloc_calls(), 1);
        assert_eq!(dev.live_events(), 0);
        assert!(dev.calls().iter().all(|c| matches!(
            c,
            crate::backend::DeviceCall::Alloc { .. } | crate::backend::DeviceCall::Free { .. }
        )));
    }

    #[test]
    fn double_free_is_rejected() {
        let dev = Arc::new(MockDevice::new(1 << 20, 0));
        let pool = pinned_on(&dev);
        let a = pool.allocate(512).unwrap();
        pool.free(&a).unwrap();
        let stats = pool.stats();
        assert!(matches!(pool.free(&a), Err(PoolError::InvalidHandle { .. })));
        assert_eq!(pool.stats(), stats);
    }

    #[test]
    fn free_all_blocks_releases_without_synchronizing() {
        let dev = Arc::new(MockDevice::new(1 << 20, 0));
        let pool = pinned_on(&dev);
        let a = pool.allocate(4096).unwrap();
        let b = pool.allocate(4096).unwrap();
        pool.free(&a).unwrap();
        pool.free(&b).unwrap();
        assert_eq!(pool.n_free_blocks(), 2);
        assert_eq!(pool.free_all_blocks().unwrap(), 8192);
        assert_eq!(pool.n_free_blocks(), 0);
        assert_eq!(dev.leak_count(), 0);
    }

    #[test]
    fn host_backed_pool_hands_out_writable_memory() {
        let pool = PinnedMemoryPool::with_host_allocator(PoolConfig::default()).unwrap();
        let a = pool.allocate(1000).unwrap();
        // SAFETY: the allocation is live and `a.size` bytes long.
        unsafe {
            let bytes = std::slice::from_raw_parts_mut(a.ptr.addr() as *mut u8, a.size);
            bytes.fill(7);
            assert_eq!(bytes[a.size - 1], 7);
        }
        pool.free(&a).unwrap();
        pool.verify().unwrap();
    }

    #[test]
    fn limit_applies_to_pinned_pool() {
        let dev = Arc::new(MockDevice::new(1 << 20, 0));
        let pool = pinned_on(&dev);
        pool.set_limit(Some(1024));
        assert!(pool.allocate(2048).unwrap_err().is_out_of_memory());
        assert_eq!(dev.alloc_calls(), 0);
    }
}
