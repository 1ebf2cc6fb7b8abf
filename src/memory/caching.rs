// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Allocate/free/evict protocol shared by the device and pinned pools.
//!
//! All bookkeeping sits behind one `parking_lot::Mutex`. The lock is held
//! across raw allocator calls (growth and shrink are serialized per pool) and
//! non-blocking queue calls, but never across `synchronize`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::allocation::Allocation;
use super::arena::{Acquired, Arena, ChunkInfo};
use super::chunk::ChunkId;
use super::error::PoolError;
use super::limits::{self, LimitSpec};
use super::pool::PoolConfig;
use super::size_class::{normalize_granularity, round_size};
use super::stats::PoolStats;
use crate::backend::{AdapterError, DeviceId, EventId, QueueId, QueueRuntime, RawAllocator};
use crate::telemetry;

/// Snapshot/synchronize/commit rounds before `free_all_blocks` gives up on
/// chunks that keep getting reused underneath it.
const MAX_EVICTION_PASSES: usize = 4;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolState {
    arena: Arena,
    limit: Option<usize>,
}

enum GrowError {
    /// Growth would exceed the configured limit; the adapter was not called.
    Limit,
    Adapter(AdapterError),
}

pub(crate) struct CachingPool {
    id: u64,
    label: String,
    device: Option<DeviceId>,
    allocator: Arc<dyn RawAllocator>,
    /// `None` for host pools: chunks are reusable as soon as they are freed.
    queues: Option<Arc<dyn QueueRuntime>>,
    search_window: Option<usize>,
    growth_factor: f64,
    state: Mutex<PoolState>,
}

impl CachingPool {
    pub fn new(
        label: String,
        device: Option<DeviceId>,
        allocator: Arc<dyn RawAllocator>,
        queues: Option<Arc<dyn QueueRuntime>>,
        config: &PoolConfig,
    ) -> Result<Self, PoolError> {
        let limit = config
            .limit
            .map(|spec| spec.resolve(allocator.total_memory()))
            .transpose()?;
        let granularity = normalize_granularity(config.granularity);
        tracing::debug!(pool = %label, granularity, ?limit, "memory pool created");
        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            label,
            device,
            allocator,
            queues,
            search_window: config.search_window.filter(|&w| w > 0),
            growth_factor: config.growth_factor.max(1.0),
            state: Mutex::new(PoolState { arena: Arena::new(granularity), limit }),
        })
    }

    pub fn granularity(&self) -> usize {
        self.state.lock().arena.granularity()
    }

    pub fn allocate(&self, size: usize, queue: Option<QueueId>) -> Result<Allocation, PoolError> {
        let mut state = self.state.lock();
        let granularity = state.arena.granularity();
        let rounded = match round_size(size, granularity) {
            Some(rounded) => rounded,
            None => return Err(self.out_of_memory(&state, size)),
        };

        if let Some(got) = self.try_reuse(&mut state, rounded, queue)? {
            telemetry::record_cache_hit(&self.label);
            return Ok(self.handle(got, size));
        }
        telemetry::record_cache_miss(&self.label);

        match self.grow(&mut state, rounded, true) {
            Ok(got) => return Ok(self.handle(got, size)),
            Err(GrowError::Limit) => return Err(self.out_of_memory(&state, size)),
            Err(GrowError::Adapter(e)) if e.is_out_of_memory() => {}
            Err(GrowError::Adapter(e)) => return Err(e.into()),
        }
        drop(state);

        tracing::warn!(
            pool = %self.label,
            requested = size,
            "raw allocator out of memory, evicting cached blocks and retrying"
        );
        self.free_all_blocks()?;

        let mut state = self.state.lock();
        if let Some(got) = self.try_reuse(&mut state, rounded, queue)? {
            return Ok(self.handle(got, size));
        }
        match self.grow(&mut state, rounded, false) {
            Ok(got) => Ok(self.handle(got, size)),
            Err(GrowError::Adapter(e)) if !e.is_out_of_memory() => Err(e.into()),
            Err(_) => Err(self.out_of_memory(&state, size)),
        }
    }

    /// Pick a cached chunk for `rounded` bytes on `queue`, inserting queue
    /// waits for any prior use that is not yet known to be complete.
    fn try_reuse(
        &self,
        state: &mut PoolState,
        rounded: usize,
        queue: Option<QueueId>,
    ) -> Result<Option<Acquired>, PoolError> {
        let candidates = state.arena.candidates(rounded, self.search_window);
        let Some(&best_fit) = candidates.first() else {
            return Ok(None);
        };

        let mut chosen = None;
        let mut best_fit_waits = Vec::new();
        for &id in &candidates {
            let outstanding = self.outstanding(&mut state.arena, id, queue)?;
            if outstanding.is_empty() {
                chosen = Some(id);
                break;
            }
            if id == best_fit {
                best_fit_waits = outstanding;
            }
        }

        let (id, waits) = match chosen {
            Some(id) => (id, Vec::new()),
            None => (best_fit, best_fit_waits),
        };
        if let (Some(queues), Some(queue)) = (&self.queues, queue) {
            for &event in &waits {
                queues.wait_event(queue, event)?;
            }
            if !waits.is_empty() {
                tracing::debug!(
                    pool = %self.label,
                    %queue,
                    waits = waits.len(),
                    "reusing chunk across queues behind event waits"
                );
            }
        }
        telemetry::record_stream_waits(&self.label, waits.len());

        let got = state.arena.acquire(id, rounded);
        self.release_events(&got.dropped_events);
        Ok(Some(got))
    }

    /// Events on other queues that still guard chunk `id`. Events found
    /// complete are dropped from the chunk.
    fn outstanding(
        &self,
        arena: &mut Arena,
        id: ChunkId,
        queue: Option<QueueId>,
    ) -> Result<Vec<EventId>, AdapterError> {
        let (Some(queues), Some(queue)) = (&self.queues, queue) else {
            return Ok(Vec::new());
        };
        let chunk = arena.chunk(id);
        if chunk.is_owned_by(queue) {
            return Ok(Vec::new());
        }
        let mut waits = Vec::new();
        let mut completed = Vec::new();
        for p in chunk.pending.iter().filter(|p| p.queue != queue) {
            if queues.event_is_complete(p.event)? {
                completed.push(p.event);
            } else {
                waits.push(p.event);
            }
        }
        let dropped = arena.forget_completed(id, &completed);
        self.release_events(&dropped);
        Ok(waits)
    }

    /// Obtain a new segment from the raw allocator and carve `rounded` bytes
    /// out of it. `over_allocate` applies the growth factor when the limit allows.
    fn grow(&self, state: &mut PoolState, rounded: usize, over_allocate: bool) -> Result<Acquired, GrowError> {
        let reserved = state.arena.reserved_total();
        if !limits::fits(reserved, rounded, state.limit) {
            tracing::debug!(
                pool = %self.label,
                rounded,
                reserved,
                limit = ?state.limit,
                "growth rejected by limit"
            );
            return Err(GrowError::Limit);
        }

        let mut grow_size = rounded;
        if over_allocate && self.growth_factor > 1.0 {
            let scaled = (rounded as f64 * self.growth_factor) as usize;
            if let Some(scaled) = round_size(scaled, state.arena.granularity()) {
                if limits::fits(reserved, scaled, state.limit) {
                    grow_size = scaled.max(rounded);
                }
            }
        }

        let ptr = self.allocator.raw_alloc(grow_size).map_err(GrowError::Adapter)?;
        let id = state.arena.add_segment(ptr, grow_size);
        tracing::debug!(
            pool = %self.label,
            %ptr,
            grow_size,
            reserved = state.arena.reserved_total(),
            "grew pool by one segment"
        );
        let got = state.arena.acquire(id, rounded);
        self.publish(state);
        Ok(got)
    }

    fn handle(&self, got: Acquired, requested: usize) -> Allocation {
        Allocation {
            ptr: got.ptr,
            size: got.size,
            requested,
            device: self.device,
            pool_id: self.id,
            chunk: got.id,
            generation: got.generation,
        }
    }

    pub fn free(&self, allocation: &Allocation, queue: Option<QueueId>) -> Result<(), PoolError> {
        if allocation.pool_id != self.id {
            return Err(PoolError::InvalidHandle {
                ptr: allocation.ptr,
                reason: "handle belongs to another pool",
            });
        }
        let mut state = self.state.lock();
        state
            .arena
            .validate(allocation.chunk, allocation.generation, allocation.ptr)
            .map_err(|reason| PoolError::InvalidHandle { ptr: allocation.ptr, reason })?;

        let event = match (&self.queues, queue) {
            (Some(queues), Some(queue)) => Some(queues.record_event(queue)?),
            _ => None,
        };
        let released = state.arena.release(allocation.chunk, queue, event);
        self.release_events(&released.dropped_events);
        Ok(())
    }

    /// Return every wholly free segment to the raw allocator after waiting for
    /// the queues that last used them. Returns the number of bytes released.
    pub fn free_all_blocks(&self) -> Result<usize, PoolError> {
        let mut released = 0;
        let mut segments = 0;

        for _ in 0..MAX_EVICTION_PASSES {
            let snapshot = self.state.lock().arena.evictable();
            if snapshot.is_empty() {
                break;
            }

            if let Some(queues) = &self.queues {
                let to_sync: BTreeSet<QueueId> =
                    snapshot.iter().flat_map(|(_, qs)| qs.iter().copied()).collect();
                for queue in to_sync {
                    queues.synchronize(queue)?;
                }
            }

            let mut state = self.state.lock();
            let mut lost = 0;
            for (ticket, _) in snapshot {
                let Some(seg) = state.arena.evict(ticket) else {
                    lost += 1;
                    continue;
                };
                self.release_events(&seg.dropped_events);
                if let Err(e) = self.allocator.raw_free(seg.ptr, seg.size) {
                    state.arena.add_segment(seg.ptr, seg.size);
                    tracing::error!(pool = %self.label, ptr = %seg.ptr, error = %e, "raw free failed");
                    return Err(e.into());
                }
                released += seg.size;
                segments += 1;
            }
            self.publish(&state);
            if lost == 0 {
                break;
            }
        }

        if segments > 0 {
            tracing::info!(pool = %self.label, segments, released, "released cached segments");
            telemetry::record_eviction(&self.label, segments, released);
        }
        Ok(released)
    }

    fn release_events(&self, events: &[EventId]) {
        if let Some(queues) = &self.queues {
            for &event in events {
                queues.release_event(event);
            }
        }
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        let mut state = self.state.lock();
        if let Some(bytes) = limit {
            if bytes < state.arena.reserved_total() {
                tracing::warn!(
                    pool = %self.label,
                    limit = bytes,
                    reserved = state.arena.reserved_total(),
                    "limit is below current reservation; growth is blocked until blocks are freed"
                );
            }
        }
        state.limit = limit;
    }

    pub fn set_limit_spec(&self, spec: LimitSpec) -> Result<usize, PoolError> {
        let bytes = spec.resolve(self.allocator.total_memory())?;
        self.set_limit(Some(bytes));
        Ok(bytes)
    }

    pub fn limit(&self) -> Option<usize> {
        self.state.lock().limit
    }

    pub fn stats(&self) -> PoolStats {
        Self::stats_of(&self.state.lock())
    }

    fn stats_of(state: &PoolState) -> PoolStats {
        PoolStats {
            reserved_total: state.arena.reserved_total(),
            allocated_total: state.arena.allocated_total(),
            limit: state.limit,
            n_free_blocks: state.arena.n_free_blocks(),
            n_segments: state.arena.n_segments(),
        }
    }

    fn publish(&self, state: &PoolState) {
        telemetry::record_pool_stats(&self.label, &Self::stats_of(state));
    }

    fn out_of_memory(&self, state: &PoolState, requested: usize) -> PoolError {
        telemetry::record_out_of_memory(&self.label);
        let err = PoolError::OutOfMemory {
            requested,
            reserved_total: state.arena.reserved_total(),
            allocated_total: state.arena.allocated_total(),
            limit: state.limit,
        };
        tracing::error!(pool = %self.label, error = %err, "allocation failed");
        err
    }

    pub fn chunks(&self) -> Vec<ChunkInfo> {
        self.state.lock().arena.chunks()
    }

    pub fn verify(&self) -> Result<(), String> {
        self.state.lock().arena.verify()
    }
}

impl Drop for CachingPool {
    fn drop(&mut self) {
        if let Err(e) = self.free_all_blocks() {
            tracing::warn!(pool = %self.label, error = %e, "failed to release cached blocks on drop");
        }
        let stats = self.stats();
        if stats.allocated_total > 0 {
            tracing::warn!(
                pool = %self.label,
                allocated = stats.allocated_total,
                "pool dropped with live allocations; their segments are leaked"
            );
        }
    }
}
