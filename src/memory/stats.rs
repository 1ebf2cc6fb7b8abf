// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Pool statistics snapshot.

use serde::{Deserialize, Serialize};

/// Point-in-time accounting for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Bytes obtained from the raw allocator and not yet returned.
    pub reserved_total: usize,
    /// Bytes currently handed out to consumers.
    pub allocated_total: usize,
    pub limit: Option<usize>,
    pub n_free_blocks: usize,
    pub n_segments: usize,
}

impl PoolStats {
    /// Cached bytes available for reuse.
    pub fn free_bytes(&self) -> usize {
        self.reserved_total - self.allocated_total
    }

    /// Fraction of the limit currently reserved, if a limit is set.
    pub fn utilization(&self) -> Option<f32> {
        match self.limit {
            Some(0) => Some(0.0),
            Some(limit) => Some(self.reserved_total as f32 / limit as f32),
            None => None,
        }
    }
}
