// Copyright 2024-2026 GG-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Pool error types.
//!
//! All errors are reported synchronously to the caller and detected before
//! any pool state is mutated.

use thiserror::Error;

use crate::backend::{AdapterError, DevicePtr};

/// Errors returned by the device and pinned pools.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error(
        "Out of memory: requested {requested} bytes \
         (reserved {reserved_total}, allocated {allocated_total}, limit {})",
        fmt_limit(.limit)
    )]
    OutOfMemory {
        requested: usize,
        reserved_total: usize,
        allocated_total: usize,
        limit: Option<usize>,
    },

    #[error("Invalid handle {ptr}: {reason}")]
    InvalidHandle { ptr: DevicePtr, reason: &'static str },

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

fn fmt_limit(limit: &Option<usize>) -> String {
    match limit {
        Some(bytes) => bytes.to_string(),
        None => "none".to_string(),
    }
}

impl PoolError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Returns true if the caller may reasonably retry after releasing memory.
    pub fn is_retryable(&self) -> bool {
        self.is_out_of_memory()
    }

    /// Returns true if this error indicates a caller bug (double free, foreign handle).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidHandle { .. } | Self::InvalidLimit(_))
    }
}
