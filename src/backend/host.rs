// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Host-memory raw allocator.
//!
//! Hands out page-aligned heap regions. Page-locking is left to the device
//! backend; this allocator is what the pinned pool runs on when no driver is
//! present (CPU fallback, tests).

use std::alloc::{self, Layout};
use std::collections::HashMap;

use parking_lot::Mutex;

use super::{AdapterError, DevicePtr, RawAllocator};

/// Alignment of every region handed out.
pub const HOST_ALIGN: usize = 4096;

/// Raw allocator over the global heap.
pub struct HostAllocator {
    capacity: Option<usize>,
    live: Mutex<HashMap<u64, usize>>,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self { capacity: None, live: Mutex::new(HashMap::new()) }
    }

    /// Cap the total bytes this allocator will hand out.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity), live: Mutex::new(HashMap::new()) }
    }

    pub fn allocated_bytes(&self) -> usize {
        self.live.lock().values().sum()
    }

    fn layout(size: usize) -> Result<Layout, AdapterError> {
        Layout::from_size_align(size, HOST_ALIGN)
            .map_err(|e| AdapterError::InvalidState(format!("bad host layout for {size} bytes: {e}")))
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for HostAllocator {
    fn raw_alloc(&self, size: usize) -> Result<DevicePtr, AdapterError> {
        if size == 0 {
            return Err(AdapterError::InvalidState("zero-sized host allocation".into()));
        }
        let mut live = self.live.lock();
        if let Some(cap) = self.capacity {
            let used: usize = live.values().sum();
            if used.checked_add(size).map_or(true, |total| total > cap) {
                return Err(AdapterError::OutOfMemory { requested: size });
            }
        }
        let layout = Layout::from_size_align(size, HOST_ALIGN)
            .map_err(|_| AdapterError::OutOfMemory { requested: size })?;
        // SAFETY: layout has non-zero size (checked above).
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            return Err(AdapterError::OutOfMemory { requested: size });
        }
        let addr = ptr as u64;
        live.insert(addr, size);
        Ok(DevicePtr(addr))
    }

    fn raw_free(&self, ptr: DevicePtr, size: usize) -> Result<(), AdapterError> {
        let mut live = self.live.lock();
        match live.get(&ptr.addr()) {
            Some(&len) if len == size => {}
            Some(&len) => {
                return Err(AdapterError::Failed(format!(
                    "size mismatch freeing host region {ptr}: allocated {len}, freed {size}"
                )))
            }
            None => {
                return Err(AdapterError::Failed(format!("unknown host region {ptr}")))
            }
        }
        let layout = Self::layout(size)?;
        live.remove(&ptr.addr());
        // SAFETY: the region was produced by `alloc::alloc` with this exact
        // layout and is removed from `live`, so it is freed once.
        unsafe { alloc::dealloc(ptr.addr() as *mut u8, layout) };
        Ok(())
    }

    fn total_memory(&self) -> Option<usize> {
        self.capacity
    }
}

impl Drop for HostAllocator {
    fn drop(&mut self) {
        for (addr, size) in self.live.get_mut().drain() {
            if let Ok(layout) = Layout::from_size_align(size, HOST_ALIGN) {
                // SAFETY: every live entry came from `alloc::alloc` with this layout.
                unsafe { alloc::dealloc(addr as *mut u8, layout) };
            }
        }
    }
}
