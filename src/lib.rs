//! GG-CORE memory pools
//!
//! Caching, stream-ordered allocators for accelerator device memory and
//! pinned host staging buffers. Freed memory stays in the pool and is handed
//! back out without a driver round-trip; reuse across execution queues is
//! ordered with recorded events instead of host-side blocking.
//!
//! # Layers
//!
//! - [`backend`]: raw allocator and queue capabilities the pools are built on
//! - [`memory`]: the pools, their registry, and handles
//! - [`config`]: `GG_MEMPOOL_*` environment and TOML configuration
//! - [`telemetry`]: `tracing` setup and `metrics` publication
//!
//! ```
//! use std::sync::Arc;
//! use gg_mempool::backend::{DeviceId, MockDevice, QueueId};
//! use gg_mempool::memory::{MemoryPool, PoolConfig};
//!
//! let device = Arc::new(MockDevice::new(1 << 20, 0));
//! let pool = MemoryPool::new(DeviceId(0), device.clone(), device, PoolConfig::default()).unwrap();
//! let buf = pool.allocate(1000, QueueId(1)).unwrap();
//! assert_eq!(buf.size, 1024);
//! pool.free(&buf, QueueId(1)).unwrap();
//! assert_eq!(pool.n_free_blocks(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod memory;
pub mod telemetry;

pub use backend::{AdapterError, DeviceId, DevicePtr, EventId, QueueId, QueueRuntime, RawAllocator};
pub use memory::{
    Allocation, MemoryPool, MemoryResource, PinnedMemoryPool, PoolConfig, PoolError, PoolRegistry, PoolStats,
};
