// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Request rounding and size-class mapping.
//!
//! Sizes are rounded up to the allocation granularity; the size class is the
//! rounded size expressed in granularity units, so every class is an exact
//! fit for the chunks filed under it.

/// Default allocation granularity for device and pinned memory.
pub const DEFAULT_GRANULARITY: usize = 512;

/// Free-index bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(usize);

impl SizeClass {
    /// Class of an already-rounded size.
    pub fn of(rounded: usize, granularity: usize) -> Self {
        debug_assert!(rounded % granularity == 0, "size {rounded} not rounded");
        Self(rounded / granularity)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn bytes(self, granularity: usize) -> usize {
        self.0 * granularity
    }
}

/// Round `size` up to a multiple of `granularity`. Zero rounds to one unit.
///
/// Returns `None` if the rounded size overflows `usize`.
pub fn round_size(size: usize, granularity: usize) -> Option<usize> {
    let size = size.max(1);
    let units = size.checked_add(granularity - 1)? / granularity;
    units.checked_mul(granularity)
}

/// Normalize a configured granularity: at least 1, rounded up to a power of two.
pub fn normalize_granularity(granularity: usize) -> usize {
    granularity.max(1).next_power_of_two()
}
