//! Caching, stream-ordered memory pools.
//!
//! [`MemoryPool`] caches device memory per device and orders reuse across
//! queues with recorded events. [`PinnedMemoryPool`] caches host staging
//! buffers. [`PoolRegistry`] owns one pool per device plus the pinned pool.

mod allocation;
mod arena;
mod caching;
mod chunk;
mod error;
mod limits;
mod pinned;
mod pool;
mod registry;
mod resource;
mod size_class;
mod stats;

pub use allocation::Allocation;
pub use arena::ChunkInfo;
pub use error::PoolError;
pub use limits::LimitSpec;
pub use pinned::PinnedMemoryPool;
pub use pool::{MemoryPool, PoolConfig};
pub use registry::{DeviceBackend, DeviceProvider, PoolRegistry, RegistrySnapshot};
pub use resource::MemoryResource;
pub use size_class::{normalize_granularity, round_size, SizeClass, DEFAULT_GRANULARITY};
pub use stats::PoolStats;
