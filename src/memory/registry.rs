// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Process-scoped registry of pools keyed by device.
//!
//! Pools are created lazily on first use and live as long as the registry.
//! The registry is an ordinary value: the runtime constructs one at startup
//! and passes it (usually as `Arc<PoolRegistry>`) to every call site.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::allocation::Allocation;
use super::error::PoolError;
use super::pinned::PinnedMemoryPool;
use super::pool::MemoryPool;
use super::stats::PoolStats;
use crate::backend::{AdapterError, DeviceId, HostAllocator, QueueId, QueueRuntime, RawAllocator};
use crate::config::RegistryConfig;

/// Raw capabilities for one device.
#[derive(Clone)]
pub struct DeviceBackend {
    pub allocator: Arc<dyn RawAllocator>,
    pub queues: Arc<dyn QueueRuntime>,
}

/// Opens device backends on demand.
pub trait DeviceProvider: Send + Sync {
    /// Called at most once per successfully opened device. Opens are
    /// serialized; the registry's read paths stay available meanwhile, but
    /// `open` must not itself request a new pool from the same registry.
    fn open(&self, device: DeviceId) -> Result<DeviceBackend, AdapterError>;

    /// Allocator behind the pinned host pool.
    fn pinned_allocator(&self) -> Result<Arc<dyn RawAllocator>, AdapterError> {
        Ok(Arc::new(HostAllocator::new()))
    }
}

impl<F> DeviceProvider for F
where
    F: Fn(DeviceId) -> Result<DeviceBackend, AdapterError> + Send + Sync,
{
    fn open(&self, device: DeviceId) -> Result<DeviceBackend, AdapterError> {
        self(device)
    }
}

/// Serializable view of every pool in the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub devices: BTreeMap<usize, PoolStats>,
    pub pinned: Option<PoolStats>,
}

pub struct PoolRegistry {
    provider: Arc<dyn DeviceProvider>,
    config: RegistryConfig,
    pools: DashMap<DeviceId, Arc<MemoryPool>>,
    /// Held across `provider.open`, never together with a map shard lock.
    opening: Mutex<()>,
    pinned: Mutex<Option<Arc<PinnedMemoryPool>>>,
}

impl PoolRegistry {
    pub fn new(provider: Arc<dyn DeviceProvider>, config: RegistryConfig) -> Self {
        Self {
            provider,
            config,
            pools: DashMap::new(),
            opening: Mutex::new(()),
            pinned: Mutex::new(None),
        }
    }

    /// Registry configured from `GG_MEMPOOL_*` environment variables.
    pub fn from_env(provider: Arc<dyn DeviceProvider>) -> Self {
        Self::new(provider, crate::config::load().pools)
    }

    /// Pool for `device`, created on first request.
    pub fn device_pool(&self, device: DeviceId) -> Result<Arc<MemoryPool>, PoolError> {
        if let Some(pool) = self.existing(device) {
            return Ok(pool);
        }
        let _opening = self.opening.lock();
        if let Some(pool) = self.existing(device) {
            return Ok(pool);
        }
        let backend = self.provider.open(device)?;
        let pool = Arc::new(MemoryPool::new(
            device,
            backend.allocator,
            backend.queues,
            self.config.device.clone(),
        )?);
        self.pools.insert(device, pool.clone());
        tracing::info!(%device, "device memory pool initialized");
        Ok(pool)
    }

    fn existing(&self, device: DeviceId) -> Option<Arc<MemoryPool>> {
        self.pools.get(&device).map(|p| p.value().clone())
    }

    /// The pinned host pool, created on first request.
    pub fn pinned_pool(&self) -> Result<Arc<PinnedMemoryPool>, PoolError> {
        let mut slot = self.pinned.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }
        let allocator = self.provider.pinned_allocator()?;
        let pool = Arc::new(PinnedMemoryPool::new(allocator, self.config.pinned.clone())?);
        tracing::info!("pinned memory pool initialized");
        *slot = Some(pool.clone());
        Ok(pool)
    }

    pub fn allocate(&self, device: DeviceId, size: usize, queue: QueueId) -> Result<Allocation, PoolError> {
        self.device_pool(device)?.allocate(size, queue)
    }

    /// Route `allocation` back to the pool that produced it.
    pub fn free(&self, allocation: &Allocation, queue: QueueId) -> Result<(), PoolError> {
        match allocation.device {
            Some(device) => {
                let pool = self.existing(device).ok_or(
                    PoolError::InvalidHandle { ptr: allocation.ptr, reason: "no pool for device" },
                )?;
                pool.free(allocation, queue)
            }
            None => {
                let pinned = self.pinned.lock().clone().ok_or(PoolError::InvalidHandle {
                    ptr: allocation.ptr,
                    reason: "no pinned pool",
                })?;
                pinned.free(allocation)
            }
        }
    }

    /// Devices that have a pool, in ascending order.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.pools.iter().map(|e| *e.key()).collect();
        devices.sort();
        devices
    }

    /// Run `free_all_blocks` on every existing pool. Returns bytes released.
    pub fn free_all_blocks(&self) -> Result<usize, PoolError> {
        let pools: Vec<Arc<MemoryPool>> = self.pools.iter().map(|e| e.value().clone()).collect();
        let mut released = 0;
        for pool in pools {
            released += pool.free_all_blocks()?;
        }
        let pinned = self.pinned.lock().clone();
        if let Some(pinned) = pinned {
            released += pinned.free_all_blocks()?;
        }
        Ok(released)
    }

    pub fn stats(&self, device: DeviceId) -> Option<PoolStats> {
        self.pools.get(&device).map(|p| p.stats())
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let devices = self.pools.iter().map(|e| (e.key().0, e.value().stats())).collect();
        let pinned = self.pinned.lock().as_ref().map(|p| p.stats());
        RegistrySnapshot { devices, pinned }
    }

    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}
