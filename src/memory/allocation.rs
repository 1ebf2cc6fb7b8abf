// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Allocation handle returned to consumers.

use crate::backend::{DeviceId, DevicePtr};

use super::chunk::ChunkId;

/// Non-owning reference to a pooled region plus the right to free it.
///
/// The pool stays the owner of the memory. A handle that has been freed (or
/// that comes from another pool) is rejected by `free` with `InvalidHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub ptr: DevicePtr,
    /// Usable bytes (the request rounded up to the pool granularity).
    pub size: usize,
    /// Bytes the consumer asked for.
    pub requested: usize,
    /// Owning device; `None` for host (pinned) allocations.
    pub device: Option<DeviceId>,
    pub(crate) pool_id: u64,
    pub(crate) chunk: ChunkId,
    pub(crate) generation: u64,
}

impl Allocation {
    /// One past the last usable address.
    pub fn end(&self) -> u64 {
        self.ptr.addr() + self.size as u64
    }

    pub fn overlaps(&self, other: &Allocation) -> bool {
        self.ptr.addr() < other.end() && other.ptr.addr() < self.end()
    }
}
