// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Mock device backend (testing + CPU fallback).
//!
//! Implements both [`RawAllocator`] and [`QueueRuntime`] in process. Every
//! call is appended to a log so tests can assert on call ordering, events stay
//! pending until the queue is synchronized or explicitly completed, and
//! allocation failures can be scripted.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::{AdapterError, DevicePtr, EventId, QueueId, QueueRuntime, RawAllocator};

const BASE_ADDR: u64 = 0x1_0000_0000;
/// Unmapped gap between regions so neighbouring segments are never contiguous.
const REGION_GAP: u64 = 0x1000;

/// One observed adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Alloc { size: usize },
    Free { ptr: DevicePtr, size: usize },
    RecordEvent { queue: QueueId, event: EventId },
    Query { event: EventId, complete: bool },
    Wait { queue: QueueId, event: EventId },
    Synchronize { queue: QueueId },
    ReleaseEvent { event: EventId },
}

struct MockEvent {
    queue: QueueId,
    complete: bool,
}

struct MockState {
    allocations: HashMap<u64, usize>,
    total: usize,
    next_addr: u64,
    next_event: u64,
    events: HashMap<EventId, MockEvent>,
    scripted_failures: VecDeque<AdapterError>,
    calls: Vec<DeviceCall>,
}

/// In-process device with a fixed capacity.
pub struct MockDevice {
    capacity: usize,
    device_index: usize,
    auto_complete: bool,
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new(capacity: usize, device_index: usize) -> Self {
        Self {
            capacity,
            device_index,
            auto_complete: false,
            state: Mutex::new(MockState {
                allocations: HashMap::new(),
                total: 0,
                next_addr: BASE_ADDR,
                next_event: 1,
                events: HashMap::new(),
                scripted_failures: VecDeque::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Events report complete as soon as they are recorded.
    pub fn with_auto_complete(mut self) -> Self {
        self.auto_complete = true;
        self
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Make the next `raw_alloc` fail with `err` regardless of capacity.
    pub fn fail_next_alloc(&self, err: AdapterError) {
        self.state.lock().scripted_failures.push_back(err);
    }

    /// Mark every event recorded on `queue` so far as complete, without
    /// logging a synchronize call.
    pub fn complete_queue(&self, queue: QueueId) {
        let mut s = self.state.lock();
        for ev in s.events.values_mut().filter(|e| e.queue == queue) {
            ev.complete = true;
        }
    }

    /// Bytes currently held by raw allocations.
    pub fn allocated_bytes(&self) -> usize {
        self.state.lock().total
    }

    /// Count of live (un-freed) raw allocations, useful for leak detection.
    pub fn leak_count(&self) -> usize {
        self.state.lock().allocations.len()
    }

    /// Events recorded but not yet released by the pool.
    pub fn live_events(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn alloc_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, DeviceCall::Alloc { .. }))
    }

    pub fn free_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, DeviceCall::Free { .. }))
    }

    pub fn wait_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, DeviceCall::Wait { .. }))
    }

    fn count_calls(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

impl RawAllocator for MockDevice {
    fn raw_alloc(&self, size: usize) -> Result<DevicePtr, AdapterError> {
        let mut s = self.state.lock();
        s.calls.push(DeviceCall::Alloc { size });
        if let Some(err) = s.scripted_failures.pop_front() {
            return Err(err);
        }
        if s.total.checked_add(size).map_or(true, |total| total > self.capacity) {
            return Err(AdapterError::OutOfMemory { requested: size });
        }
        let addr = s.next_addr;
        s.next_addr += size as u64 + REGION_GAP;
        s.allocations.insert(addr, size);
        s.total += size;
        Ok(DevicePtr(addr))
    }

    fn raw_free(&self, ptr: DevicePtr, size: usize) -> Result<(), AdapterError> {
        let mut s = self.state.lock();
        s.calls.push(DeviceCall::Free { ptr, size });
        match s.allocations.remove(&ptr.addr()) {
            Some(len) if len == size => {
                s.total -= len;
                Ok(())
            }
            Some(len) => {
                s.allocations.insert(ptr.addr(), len);
                Err(AdapterError::Failed(format!(
                    "size mismatch freeing {ptr}: allocated {len}, freed {size}"
                )))
            }
            None => Err(AdapterError::Failed(format!(
                "double-free or unknown region {ptr}"
            ))),
        }
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity)
    }
}

impl QueueRuntime for MockDevice {
    fn record_event(&self, queue: QueueId) -> Result<EventId, AdapterError> {
        let mut s = self.state.lock();
        let event = EventId(s.next_event);
        s.next_event += 1;
        s.events.insert(event, MockEvent { queue, complete: self.auto_complete });
        s.calls.push(DeviceCall::RecordEvent { queue, event });
        Ok(event)
    }

    fn event_is_complete(&self, event: EventId) -> Result<bool, AdapterError> {
        let mut s = self.state.lock();
        let complete = match s.events.get(&event) {
            Some(ev) => ev.complete,
            None => {
                return Err(AdapterError::InvalidState(format!(
                    "query of unknown event {}",
                    event.0
                )))
            }
        };
        s.calls.push(DeviceCall::Query { event, complete });
        Ok(complete)
    }

    fn wait_event(&self, queue: QueueId, event: EventId) -> Result<(), AdapterError> {
        let mut s = self.state.lock();
        if !s.events.contains_key(&event) {
            return Err(AdapterError::InvalidState(format!(
                "wait on unknown event {}",
                event.0
            )));
        }
        s.calls.push(DeviceCall::Wait { queue, event });
        Ok(())
    }

    fn synchronize(&self, queue: QueueId) -> Result<(), AdapterError> {
        let mut s = self.state.lock();
        for ev in s.events.values_mut().filter(|e| e.queue == queue) {
            ev.complete = true;
        }
        s.calls.push(DeviceCall::Synchronize { queue });
        Ok(())
    }

    fn release_event(&self, event: EventId) {
        let mut s = self.state.lock();
        if s.events.remove(&event).is_some() {
            s.calls.push(DeviceCall::ReleaseEvent { event });
        }
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
