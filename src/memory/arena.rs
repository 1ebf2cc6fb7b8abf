// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Chunk bookkeeping for one pool.
//!
//! Chunks live in an index-addressed slot table; physical neighbours are
//! linked by [`ChunkId`] rather than by reference. Each raw allocation is a
//! *segment*: splitting and coalescing stay inside a segment, and only a
//! segment that is entirely free can be handed back to the raw allocator.
//!
//! The arena is not synchronized. Its owner holds it behind a single lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::chunk::{Chunk, ChunkId, ChunkState, PendingUse};
use super::size_class::SizeClass;
use crate::backend::{DevicePtr, EventId, QueueId};

/// Read-only view of a chunk, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub ptr: u64,
    pub size: usize,
    pub segment: u64,
    pub in_use: bool,
    /// Queue that freed the chunk last, if any.
    pub last_queue: Option<u64>,
}

/// Identity of a free chunk at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeTicket {
    pub id: ChunkId,
    pub free_seq: u64,
}

/// Result of handing a free chunk out.
#[derive(Debug)]
pub(crate) struct Acquired {
    pub id: ChunkId,
    pub ptr: DevicePtr,
    pub size: usize,
    pub generation: u64,
    /// Events nothing references any more; the caller releases them.
    pub dropped_events: Vec<EventId>,
}

/// Result of returning a chunk to the free index.
#[derive(Debug)]
pub(crate) struct Released {
    pub id: ChunkId,
    /// Events superseded by newer uses on the same queue.
    pub dropped_events: Vec<EventId>,
}

/// A whole segment removed from the arena.
#[derive(Debug)]
pub(crate) struct EvictedSegment {
    pub ptr: DevicePtr,
    pub size: usize,
    pub dropped_events: Vec<EventId>,
}

pub struct Arena {
    granularity: usize,
    slots: Vec<Option<Chunk>>,
    vacant: Vec<usize>,
    by_address: BTreeMap<u64, ChunkId>,
    free_by_size_class: BTreeMap<SizeClass, BTreeSet<(u64, ChunkId)>>,
    segments: BTreeMap<u64, usize>,
    event_refs: HashMap<EventId, usize>,
    reserved_total: usize,
    allocated_total: usize,
    next_free_seq: u64,
    next_record_seq: u64,
    next_generation: u64,
}

impl Arena {
    pub fn new(granularity: usize) -> Self {
        Self {
            granularity,
            slots: Vec::new(),
            vacant: Vec::new(),
            by_address: BTreeMap::new(),
            free_by_size_class: BTreeMap::new(),
            segments: BTreeMap::new(),
            event_refs: HashMap::new(),
            reserved_total: 0,
            allocated_total: 0,
            next_free_seq: 0,
            next_record_seq: 0,
            next_generation: 1,
        }
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    pub fn reserved_total(&self) -> usize {
        self.reserved_total
    }

    pub fn allocated_total(&self) -> usize {
        self.allocated_total
    }

    pub fn n_free_blocks(&self) -> usize {
        self.free_by_size_class.values().map(BTreeSet::len).sum()
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("arena corrupted: chunk slot {} is vacant", id.0))
    }

    fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("arena corrupted: chunk slot {} is vacant", id.0))
    }

    fn try_chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn new_slot(&mut self, chunk: Chunk) -> ChunkId {
        let addr = chunk.ptr.addr();
        let id = match self.vacant.pop() {
            Some(idx) => {
                self.slots[idx] = Some(chunk);
                ChunkId(idx)
            }
            None => {
                self.slots.push(Some(chunk));
                ChunkId(self.slots.len() - 1)
            }
        };
        self.by_address.insert(addr, id);
        id
    }

    fn drop_slot(&mut self, id: ChunkId) -> Chunk {
        let chunk = self.slots[id.0]
            .take()
            .unwrap_or_else(|| panic!("arena corrupted: dropping vacant slot {}", id.0));
        self.by_address.remove(&chunk.ptr.addr());
        self.vacant.push(id.0);
        chunk
    }

    fn class_of(&self, size: usize) -> SizeClass {
        SizeClass::of(size, self.granularity)
    }

    fn index_free(&mut self, id: ChunkId) {
        let (class, key) = {
            let c = self.chunk(id);
            (self.class_of(c.size), (c.free_seq, id))
        };
        self.free_by_size_class.entry(class).or_default().insert(key);
    }

    fn unindex_free(&mut self, id: ChunkId) {
        let (class, key) = {
            let c = self.chunk(id);
            (self.class_of(c.size), (c.free_seq, id))
        };
        let bucket = self
            .free_by_size_class
            .get_mut(&class)
            .unwrap_or_else(|| panic!("free chunk {} missing from size class {:?}", id.0, class));
        if !bucket.remove(&key) {
            panic!("free chunk {} missing from size class {:?}", id.0, class);
        }
        if bucket.is_empty() {
            self.free_by_size_class.remove(&class);
        }
    }

    fn retain_events(&mut self, pending: &[PendingUse]) {
        for p in pending {
            *self.event_refs.entry(p.event).or_insert(0) += 1;
        }
    }

    fn drop_events(&mut self, pending: Vec<PendingUse>) -> Vec<EventId> {
        let mut dropped = Vec::new();
        for p in pending {
            if let Some(count) = self.event_refs.get_mut(&p.event) {
                *count -= 1;
                if *count == 0 {
                    self.event_refs.remove(&p.event);
                    dropped.push(p.event);
                }
            }
        }
        dropped
    }

    /// Pending uses of every free chunk. Counts shared events once per holder.
    pub fn pending_uses(&self) -> usize {
        self.slots.iter().flatten().map(|c| c.pending.len()).sum()
    }

    fn take_free_seq(&mut self) -> u64 {
        let seq = self.next_free_seq;
        self.next_free_seq += 1;
        seq
    }

    /// Register a freshly allocated raw region as one free chunk.
    pub fn add_segment(&mut self, ptr: DevicePtr, size: usize) -> ChunkId {
        debug_assert!(size > 0 && size % self.granularity == 0);
        let free_seq = self.take_free_seq();
        let id = self.new_slot(Chunk {
            ptr,
            size,
            segment: ptr,
            state: ChunkState::Free,
            last_queue: None,
            pending: Vec::new(),
            prev: None,
            next: None,
            generation: 0,
            free_seq,
        });
        self.segments.insert(ptr.addr(), size);
        self.reserved_total += size;
        self.index_free(id);
        id
    }

    /// Free chunks of at least `size` bytes, best fit first, then least
    /// recently freed. At most `window` are returned (`None` = all).
    pub fn candidates(&self, size: usize, window: Option<usize>) -> Vec<ChunkId> {
        let limit = window.unwrap_or(usize::MAX);
        self.free_by_size_class
            .range(self.class_of(size)..)
            .flat_map(|(_, bucket)| bucket.iter().map(|&(_, id)| id))
            .take(limit)
            .collect()
    }

    /// Hand out `size` bytes from free chunk `id`, splitting off the remainder.
    pub(crate) fn acquire(&mut self, id: ChunkId, size: usize) -> Acquired {
        assert!(self.chunk(id).is_free(), "acquire of in-use chunk {}", id.0);
        assert!(self.chunk(id).size >= size, "chunk {} too small for {size}", id.0);
        self.unindex_free(id);

        let remainder = self.chunk(id).size - size;
        if remainder >= self.granularity {
            self.split(id, size, remainder);
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let chunk = self.chunk_mut(id);
        chunk.state = ChunkState::InUse;
        chunk.generation = generation;
        let pending = std::mem::take(&mut chunk.pending);
        let (ptr, size) = (chunk.ptr, chunk.size);
        self.allocated_total += size;
        let dropped_events = self.drop_events(pending);

        Acquired { id, ptr, size, generation, dropped_events }
    }

    fn split(&mut self, id: ChunkId, size: usize, remainder: usize) {
        let (ptr, segment, last_queue, pending, next, free_seq) = {
            let c = self.chunk(id);
            (c.ptr.offset(size), c.segment, c.last_queue, c.pending.clone(), c.next, c.free_seq)
        };
        self.retain_events(&pending);
        let rest = self.new_slot(Chunk {
            ptr,
            size: remainder,
            segment,
            state: ChunkState::Free,
            last_queue,
            pending,
            prev: Some(id),
            next,
            generation: 0,
            free_seq,
        });
        if let Some(n) = next {
            self.chunk_mut(n).prev = Some(rest);
        }
        let chunk = self.chunk_mut(id);
        chunk.size = size;
        chunk.next = Some(rest);
        self.index_free(rest);
    }

    /// Check that `id`/`generation`/`ptr` name a chunk that is currently in use.
    pub fn validate(&self, id: ChunkId, generation: u64, ptr: DevicePtr) -> Result<(), &'static str> {
        let chunk = self.try_chunk(id).ok_or("unknown chunk")?;
        if chunk.ptr != ptr || chunk.generation != generation {
            return Err("stale or foreign handle");
        }
        if chunk.state != ChunkState::InUse {
            return Err("chunk is not in use");
        }
        Ok(())
    }

    /// Return an in-use chunk to the free index, coalescing with free neighbours.
    pub(crate) fn release(&mut self, id: ChunkId, queue: Option<QueueId>, event: Option<EventId>) -> Released {
        let pending: Vec<PendingUse> = match (queue, event) {
            (Some(queue), Some(event)) => {
                let seq = self.next_record_seq;
                self.next_record_seq += 1;
                vec![PendingUse { queue, event, seq }]
            }
            _ => Vec::new(),
        };
        self.retain_events(&pending);
        let free_seq = self.take_free_seq();
        let chunk = self.chunk_mut(id);
        assert_eq!(chunk.state, ChunkState::InUse, "release of free chunk {}", id.0);
        chunk.state = ChunkState::Free;
        chunk.last_queue = queue;
        chunk.pending = pending;
        chunk.free_seq = free_seq;
        let size = chunk.size;
        self.allocated_total -= size;

        let mut head = id;
        let mut dropped_events = Vec::new();
        if let Some(prev) = self.chunk(id).prev {
            if self.chunk(prev).is_free() {
                self.unindex_free(prev);
                dropped_events.extend(self.merge_next_into(prev));
                head = prev;
            }
        }
        if let Some(next) = self.chunk(head).next {
            if self.chunk(next).is_free() {
                self.unindex_free(next);
                dropped_events.extend(self.merge_next_into(head));
            }
        }
        let merged = self.chunk_mut(head);
        merged.free_seq = free_seq;
        merged.last_queue = queue;
        self.index_free(head);
        Released { id: head, dropped_events }
    }

    /// Absorb `id`'s next neighbour into `id`. Both must be out of the free
    /// index. Returns events no chunk references any more.
    fn merge_next_into(&mut self, id: ChunkId) -> Vec<EventId> {
        let next = self
            .chunk(id)
            .next
            .unwrap_or_else(|| panic!("merge of chunk {} without a successor", id.0));
        let absorbed = self.drop_slot(next);
        debug_assert_eq!(absorbed.segment, self.chunk(id).segment);
        if let Some(n) = absorbed.next {
            self.chunk_mut(n).prev = Some(id);
        }

        let chunk = self.chunk_mut(id);
        chunk.size += absorbed.size;
        chunk.next = absorbed.next;
        let superseded = keep_newest_per_queue(&mut chunk.pending, absorbed.pending);
        self.drop_events(superseded)
    }

    /// Forget pending uses of free chunk `id` whose events are known complete.
    /// Returns events no chunk references any more.
    pub(crate) fn forget_completed(&mut self, id: ChunkId, completed: &[EventId]) -> Vec<EventId> {
        if completed.is_empty() {
            return Vec::new();
        }
        let chunk = self.chunk_mut(id);
        let (done, kept): (Vec<PendingUse>, Vec<PendingUse>) =
            std::mem::take(&mut chunk.pending).into_iter().partition(|p| completed.contains(&p.event));
        chunk.pending = kept;
        self.drop_events(done)
    }

    /// Free chunks that span a whole segment and could be returned to the
    /// raw allocator, with the queues they still have outstanding work on.
    pub(crate) fn evictable(&self) -> Vec<(FreeTicket, Vec<QueueId>)> {
        self.free_by_size_class
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter_map(|&(free_seq, id)| {
                let c = self.chunk(id);
                if c.prev.is_some() || c.next.is_some() {
                    return None;
                }
                let mut queues: Vec<QueueId> = c.pending.iter().map(|p| p.queue).collect();
                queues.sort();
                queues.dedup();
                Some((FreeTicket { id, free_seq }, queues))
            })
            .collect()
    }

    /// Remove the segment named by `ticket` if it is still the same whole free
    /// chunk it was when the ticket was taken.
    pub(crate) fn evict(&mut self, ticket: FreeTicket) -> Option<EvictedSegment> {
        let c = self.try_chunk(ticket.id)?;
        if !c.is_free() || c.free_seq != ticket.free_seq || c.prev.is_some() || c.next.is_some() {
            return None;
        }
        self.unindex_free(ticket.id);
        let chunk = self.drop_slot(ticket.id);
        self.segments.remove(&chunk.segment.addr());
        self.reserved_total -= chunk.size;
        let dropped_events = self.drop_events(chunk.pending);
        Some(EvictedSegment { ptr: chunk.ptr, size: chunk.size, dropped_events })
    }

    /// All chunks in address order.
    pub fn chunks(&self) -> Vec<ChunkInfo> {
        self.by_address
            .values()
            .map(|&id| {
                let c = self.chunk(id);
                ChunkInfo {
                    ptr: c.ptr.addr(),
                    size: c.size,
                    segment: c.segment.addr(),
                    in_use: c.state == ChunkState::InUse,
                    last_queue: c.last_queue.map(|q| q.0),
                }
            })
            .collect()
    }

    /// Exhaustive consistency check.
    pub fn verify(&self) -> Result<(), String> {
        let mut allocated = 0;
        let mut free_seen = 0;
        for (&base, &seg_size) in &self.segments {
            let mut cursor = base;
            let end = base + seg_size as u64;
            let mut id = *self
                .by_address
                .get(&base)
                .ok_or_else(|| format!("segment {base:#x} has no head chunk"))?;
            let mut prev = None;
            loop {
                let c = self.try_chunk(id).ok_or_else(|| format!("dangling chunk id {}", id.0))?;
                if c.ptr.addr() != cursor {
                    return Err(format!("gap or overlap at {cursor:#x} in segment {base:#x}"));
                }
                if c.segment.addr() != base || c.prev != prev {
                    return Err(format!("broken adjacency at {cursor:#x}"));
                }
                if c.size == 0 || c.size % self.granularity != 0 {
                    return Err(format!("chunk at {cursor:#x} has unaligned size {}", c.size));
                }
                match c.state {
                    ChunkState::InUse => {
                        if !c.pending.is_empty() {
                            return Err(format!("in-use chunk at {cursor:#x} has pending uses"));
                        }
                        allocated += c.size;
                    }
                    ChunkState::Free => {
                        for (i, p) in c.pending.iter().enumerate() {
                            if c.pending[i + 1..].iter().any(|q| q.queue == p.queue) {
                                return Err(format!("chunk at {cursor:#x} holds two uses on {}", p.queue));
                            }
                        }
                        free_seen += 1;
                        let indexed = self
                            .free_by_size_class
                            .get(&self.class_of(c.size))
                            .map_or(false, |b| b.contains(&(c.free_seq, id)));
                        if !indexed {
                            return Err(format!("free chunk at {cursor:#x} missing from index"));
                        }
                        if let Some(p) = prev {
                            if self.chunk(p).is_free() {
                                return Err(format!("uncoalesced free neighbours at {cursor:#x}"));
                            }
                        }
                    }
                }
                cursor = c.end();
                prev = Some(id);
                match c.next {
                    Some(n) => id = n,
                    None => break,
                }
            }
            if cursor != end {
                return Err(format!("segment {base:#x} not covered: ends at {cursor:#x}"));
            }
        }
        let reserved: usize = self.segments.values().sum();
        if reserved != self.reserved_total {
            return Err(format!("reserved_total {} != segments {}", self.reserved_total, reserved));
        }
        if allocated != self.allocated_total {
            return Err(format!("allocated_total {} != in-use {}", self.allocated_total, allocated));
        }
        if free_seen != self.n_free_blocks() {
            return Err("free index holds chunks outside any segment".to_string());
        }
        if self.by_address.len() != self.slots.len() - self.vacant.len() {
            return Err("address index out of sync with slot table".to_string());
        }
        let mut holders: HashMap<EventId, usize> = HashMap::new();
        for p in self.slots.iter().flatten().flat_map(|c| c.pending.iter()) {
            *holders.entry(p.event).or_insert(0) += 1;
        }
        if holders != self.event_refs {
            return Err("event reference counts out of sync with pending uses".to_string());
        }
        Ok(())
    }
}

/// Fold `incoming` into `pending`, keeping only the newest use per queue.
/// Returns the uses that were superseded.
fn keep_newest_per_queue(pending: &mut Vec<PendingUse>, incoming: Vec<PendingUse>) -> Vec<PendingUse> {
    let mut superseded = Vec::new();
    for p in incoming {
        match pending.iter_mut().find(|q| q.queue == p.queue) {
            Some(existing) if existing.seq >= p.seq => superseded.push(p),
            Some(existing) => superseded.push(std::mem::replace(existing, p)),
            None => pending.push(p),
        }
    }
    superseded
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: usize = 512;

    fn arena_with_segment(size: usize) -> (Arena, ChunkId) {
        let mut arena = Arena::new(G);
        let id = arena.add_segment(DevicePtr(0x10000), size);
        (arena, id)
    }

    #[test]
    fn split_returns_exact_fit_and_free_remainder() {
        let (mut arena, id) = arena_with_segment(4 * G);
        let got = arena.acquire(id, G);
        assert_eq!(got.size, G);
        assert_eq!(got.ptr, DevicePtr(0x10000));
        assert_eq!(arena.allocated_total(), G);
        assert_eq!(arena.n_free_blocks(), 1);
        let rest = arena.candidates(G, None);
        assert_eq!(arena.chunk(rest[0]).size, 3 * G);
        assert_eq!(arena.chunk(rest[0]).ptr, DevicePtr(0x10000 + G as u64));
        arena.verify().unwrap();
    }

    #[test]
    fn release_coalesces_both_directions() {
        let (mut arena, id) = arena_with_segment(3 * G);
        let a = arena.acquire(id, G);
        let b_id = arena.candidates(G, None)[0];
        let b = arena.acquire(b_id, G);
        let c_id = arena.candidates(G, None)[0];
        let c = arena.acquire(c_id, G);
        assert_eq!(arena.n_free_blocks(), 0);

        arena.release(a.id, None, None);
        arena.release(c.id, None, None);
        assert_eq!(arena.n_free_blocks(), 2);
        let merged = arena.release(b.id, None, None).id;
        assert_eq!(arena.n_free_blocks(), 1);
        assert_eq!(arena.chunk(merged).size, 3 * G);
        arena.verify().unwrap();
    }

    #[test]
    fn candidates_prefer_best_fit_then_oldest() {
        let mut arena = Arena::new(G);
        let big = arena.add_segment(DevicePtr(0x100000), 8 * G);
        let old = arena.add_segment(DevicePtr(0x200000), 2 * G);
        let young = arena.add_segment(DevicePtr(0x300000), 2 * G);
        assert_eq!(arena.candidates(G, None), vec![old, young, big]);
        assert_eq!(arena.candidates(3 * G, None), vec![big]);
        assert_eq!(arena.candidates(G, Some(1)), vec![old]);
    }

    #[test]
    fn validate_rejects_stale_generation() {
        let (mut arena, id) = arena_with_segment(G);
        let got = arena.acquire(id, G);
        assert!(arena.validate(got.id, got.generation, got.ptr).is_ok());
        arena.release(got.id, None, None);
        assert_eq!(arena.validate(got.id, got.generation, got.ptr), Err("chunk is not in use"));
        let again = arena.acquire(id, G);
        assert_ne!(again.generation, got.generation);
        assert!(arena.validate(got.id, got.generation, got.ptr).is_err());
    }

    #[test]
    fn shared_events_are_dropped_once() {
        let (mut arena, id) = arena_with_segment(2 * G);
        let whole = arena.acquire(id, 2 * G);
        arena.release(whole.id, Some(QueueId(1)), Some(EventId(7)));

        // Splitting copies the pending use; the event survives the first half.
        let first = arena.acquire(id, G);
        assert!(first.dropped_events.is_empty());
        let rest = arena.candidates(G, None)[0];
        let second = arena.acquire(rest, G);
        assert_eq!(second.dropped_events, vec![EventId(7)]);
    }

    #[test]
    fn merge_keeps_newest_use_per_queue() {
        let (mut arena, id) = arena_with_segment(4 * G);
        let whole = arena.acquire(id, 4 * G);
        arena.release(whole.id, Some(QueueId(1)), Some(EventId(1)));

        // Cycle the head so its events keep landing on the shared tail.
        for event in 2..50 {
            let head = arena.acquire(id, G);
            let released = arena.release(head.id, Some(QueueId(1)), Some(EventId(event)));
            assert_eq!(released.dropped_events, vec![EventId(event - 1)]);
            assert_eq!(arena.chunk(released.id).pending.len(), 1);
        }
        assert_eq!(arena.pending_uses(), 1);
        arena.verify().unwrap();
    }

    #[test]
    fn merge_keeps_one_use_for_each_queue() {
        let (mut arena, id) = arena_with_segment(2 * G);
        let a = arena.acquire(id, G);
        let b_id = arena.candidates(G, None)[0];
        let b = arena.acquire(b_id, G);
        arena.release(a.id, Some(QueueId(1)), Some(EventId(1)));
        let released = arena.release(b.id, Some(QueueId(2)), Some(EventId(2)));
        assert!(released.dropped_events.is_empty());
        let mut queues: Vec<QueueId> = arena.chunk(released.id).pending.iter().map(|p| p.queue).collect();
        queues.sort();
        assert_eq!(queues, vec![QueueId(1), QueueId(2)]);
        arena.verify().unwrap();
    }

    #[test]
    fn completed_events_are_forgotten() {
        let (mut arena, id) = arena_with_segment(2 * G);
        let whole = arena.acquire(id, 2 * G);
        arena.release(whole.id, Some(QueueId(3)), Some(EventId(9)));
        let head = arena.acquire(id, G);
        let tail = arena.candidates(G, None)[0];

        // Only the tail still references the event.
        assert_eq!(arena.forget_completed(tail, &[EventId(9)]), vec![EventId(9)]);
        assert!(arena.chunk(tail).pending.is_empty());
        assert!(arena.forget_completed(tail, &[]).is_empty());
        arena.release(head.id, None, None);
        arena.verify().unwrap();
    }

    #[test]
    fn only_whole_segments_are_evictable() {
        let mut arena = Arena::new(G);
        let whole = arena.add_segment(DevicePtr(0x100000), 2 * G);
        let split = arena.add_segment(DevicePtr(0x200000), 2 * G);
        let held = arena.acquire(split, G);

        let evictable = arena.evictable();
        assert_eq!(evictable.len(), 1);
        assert_eq!(evictable[0].0.id, whole);

        let seg = arena.evict(evictable[0].0).unwrap();
        assert_eq!(seg.size, 2 * G);
        assert_eq!(arena.reserved_total(), 2 * G);
        assert_eq!(arena.allocated_total(), G);
        arena.verify().unwrap();
        assert!(arena.validate(held.id, held.generation, held.ptr).is_ok());
    }

    #[test]
    fn stale_ticket_is_not_evicted() {
        let (mut arena, id) = arena_with_segment(G);
        let ticket = arena.evictable()[0].0;
        let got = arena.acquire(id, G);
        assert!(arena.evict(ticket).is_none());
        arena.release(got.id, None, None);
        assert!(arena.evict(ticket).is_none());
        assert_eq!(arena.reserved_total(), G);
    }

    #[test]
    fn evictable_reports_pending_queues() {
        let (mut arena, id) = arena_with_segment(G);
        let got = arena.acquire(id, G);
        arena.release(got.id, Some(QueueId(4)), Some(EventId(1)));
        let (_, queues) = arena.evictable().remove(0);
        assert_eq!(queues, vec![QueueId(4)]);
        assert_eq!(arena.chunks()[0].last_queue, Some(4));
    }
}
