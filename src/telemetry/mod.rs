//! Telemetry for the memory pools.
//!
//! Structured logging through `tracing` and counters/gauges through the
//! `metrics` facade. Nothing is exported unless the host installs a
//! subscriber or recorder.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_cache_hit, record_cache_miss, record_eviction, record_out_of_memory, record_pool_stats,
    record_stream_waits,
};
