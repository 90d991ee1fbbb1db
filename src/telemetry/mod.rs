//! Run statistics for the GLOF monitor.
//!
//! Tracks what the evaluation loop did (ticks, escalations, notification
//! outcomes) so operators can audit a running or finished monitor.

pub mod stats;

// Re-export commonly used types
pub use stats::{
    create_shared_stats, create_shared_stats_with_persistence, MonitorStats,
    MonitorStatsSnapshot, PersistedStats, SharedMonitorStats,
};
