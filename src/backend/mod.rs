// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Raw allocator and execution-queue capabilities.
//!
//! The pools never talk to a driver directly. Everything below the caching
//! layer is injected through [`RawAllocator`] (grow/shrink) and
//! [`QueueRuntime`] (events and queue ordering).

pub mod host;
pub mod mock;

use std::fmt;

use thiserror::Error;

pub use host::HostAllocator;
pub use mock::{DeviceCall, MockDevice};

/// Opaque address in device or host address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    pub fn addr(self) -> u64 {
        self.0
    }

    /// Address `bytes` past this one.
    pub fn offset(self, bytes: usize) -> DevicePtr {
        DevicePtr(self.0 + bytes as u64)
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Execution queue (stream) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QueueId(pub u64);

impl QueueId {
    /// The device's default (legacy) queue.
    pub const DEFAULT: QueueId = QueueId(0);
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Completion marker recorded on a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

/// Device ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device{}", self.0)
    }
}

/// Failures reported by the raw allocator or queue primitives.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Memory pressure: the only variant the pool answers with eviction.
    #[error("Device out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Device in invalid state: {0}")]
    InvalidState(String),

    #[error("Adapter operation failed: {0}")]
    Failed(String),
}

impl AdapterError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Underlying (uncached) allocation primitive for one device or host pool.
///
/// Calls are serialized by the owning pool's lock.
pub trait RawAllocator: Send + Sync {
    fn raw_alloc(&self, size: usize) -> Result<DevicePtr, AdapterError>;

    /// Return a region obtained from `raw_alloc`. `size` is the size it was
    /// allocated with.
    fn raw_free(&self, ptr: DevicePtr, size: usize) -> Result<(), AdapterError>;

    /// Total capacity of the device, if the backend knows it.
    fn total_memory(&self) -> Option<usize> {
        None
    }
}

/// Execution-queue primitives used for stream-ordered reuse.
pub trait QueueRuntime: Send + Sync {
    /// Record a marker satisfied once all work enqueued on `queue` so far completes.
    fn record_event(&self, queue: QueueId) -> Result<EventId, AdapterError>;

    /// Non-blocking completion poll.
    fn event_is_complete(&self, event: EventId) -> Result<bool, AdapterError>;

    /// Order all later work on `queue` after `event`. Never blocks the caller.
    fn wait_event(&self, queue: QueueId, event: EventId) -> Result<(), AdapterError>;

    /// Block the calling thread until `queue` drains.
    fn synchronize(&self, queue: QueueId) -> Result<(), AdapterError>;

    /// Called once the pool holds no further reference to `event`.
    fn release_event(&self, _event: EventId) {}
}
