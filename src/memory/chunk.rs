// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Chunk metadata.

use crate::backend::{DevicePtr, EventId, QueueId};

/// Index of a chunk slot within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Free,
    InUse,
}

/// Outstanding asynchronous use of a freed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUse {
    pub queue: QueueId,
    pub event: EventId,
    /// Record order within the arena. A later use on the same queue
    /// completes only after every earlier one.
    pub seq: u64,
}

/// One contiguous region inside a segment.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub ptr: DevicePtr,
    pub size: usize,
    /// Base address of the raw segment this chunk was carved from.
    pub segment: DevicePtr,
    pub state: ChunkState,
    /// Queue that released the chunk most recently.
    pub last_queue: Option<QueueId>,
    /// Uses not yet proven complete, at most one per queue. Empty while
    /// `InUse` and in pinned arenas.
    pub pending: Vec<PendingUse>,
    pub prev: Option<ChunkId>,
    pub next: Option<ChunkId>,
    /// Bumped each time the chunk is handed out.
    pub generation: u64,
    /// Position in the free index; smaller means freed earlier.
    pub(crate) free_seq: u64,
}

impl Chunk {
    pub fn end(&self) -> u64 {
        self.ptr.addr() + self.size as u64
    }

    pub fn is_free(&self) -> bool {
        self.state == ChunkState::Free
    }

    /// True if reusing this chunk on `queue` needs no ordering with other queues.
    pub fn is_owned_by(&self, queue: QueueId) -> bool {
        self.pending.iter().all(|p| p.queue == queue)
    }
}
