//! Runtime statistics for the hand monitor.
//!
//! Counters are updated lock-free from the collector, consumer and sink
//! threads and can be persisted between sessions.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, PipelineStats, SharedPipelineStats,
    StatsSnapshot,
};
