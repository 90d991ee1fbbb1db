//! Run statistics for the monitor.
//!
//! Counters are atomic so the runner, the console renderer and the HTTP
//! server can read them without coordination. Cumulative totals are persisted
//! between runs for the `status` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Counters for the current run.
#[derive(Debug)]
pub struct MonitorStats {
    /// Ticks that scored and were applied
    ticks_evaluated: AtomicU64,
    /// Ticks dropped because the snapshot could not be scored
    ticks_skipped: AtomicU64,
    /// Normal → Escalated transitions
    escalations: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    last_notify_error: Mutex<Option<String>>,
    station: String,
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            ticks_evaluated: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            last_notify_error: Mutex::new(None),
            station: station_id(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that continue from the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous monitor stats: {e}");
        }

        stats
    }

    pub fn record_tick_evaluated(&self) {
        self.ticks_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Monitoring hook for dispatch failures.
    pub fn record_notification_failed(&self, error: impl std::fmt::Display) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_notify_error.lock() {
            *last = Some(error.to_string());
        }
    }

    /// Get the current statistics.
    pub fn stats(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            station: self.station.clone(),
            ticks_evaluated: self.ticks_evaluated.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            last_notify_error: self.last_notify_error.lock().ok().and_then(|e| e.clone()),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut summary = format!(
            "Monitor Statistics ({}):\n\
             - Ticks evaluated: {}\n\
             - Ticks skipped: {}\n\
             - Escalations: {}\n\
             - Notifications sent: {}\n\
             - Notifications failed: {}\n\
             - Session duration: {} seconds",
            stats.station,
            stats.ticks_evaluated,
            stats.ticks_skipped,
            stats.escalations,
            stats.notifications_sent,
            stats.notifications_failed,
            stats.session_duration_secs
        );
        if let Some(error) = stats.last_notify_error {
            summary.push_str(&format!("\n - Last notification error: {error}"));
        }
        summary
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                station: stats.station,
                ticks_evaluated: stats.ticks_evaluated,
                ticks_skipped: stats.ticks_skipped,
                escalations: stats.escalations,
                notifications_sent: stats.notifications_sent,
                notifications_failed: stats.notifications_failed,
                last_notify_error: stats.last_notify_error,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = PersistedStats::read(path)?;

                self.ticks_evaluated
                    .store(persisted.ticks_evaluated, Ordering::Relaxed);
                self.ticks_skipped
                    .store(persisted.ticks_skipped, Ordering::Relaxed);
                self.escalations
                    .store(persisted.escalations, Ordering::Relaxed);
                self.notifications_sent
                    .store(persisted.notifications_sent, Ordering::Relaxed);
                self.notifications_failed
                    .store(persisted.notifications_failed, Ordering::Relaxed);
                if let Ok(mut last) = self.last_notify_error.lock() {
                    *last = persisted.last_notify_error;
                }
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.ticks_evaluated.store(0, Ordering::Relaxed);
        self.ticks_skipped.store(0, Ordering::Relaxed);
        self.escalations.store(0, Ordering::Relaxed);
        self.notifications_sent.store(0, Ordering::Relaxed);
        self.notifications_failed.store(0, Ordering::Relaxed);
        if let Ok(mut last) = self.last_notify_error.lock() {
            *last = None;
        }
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies the machine running the monitor.
fn station_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-station".to_string())
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatsSnapshot {
    pub station: String,
    pub ticks_evaluated: u64,
    pub ticks_skipped: u64,
    pub escalations: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub last_notify_error: Option<String>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    pub station: String,
    pub ticks_evaluated: u64,
    pub ticks_skipped: u64,
    pub escalations: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub last_notify_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl PersistedStats {
    /// Read totals written by a previous run.
    pub fn read(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

/// Thread-safe shared stats.
pub type SharedMonitorStats = Arc<MonitorStats>;

pub fn create_shared_stats() -> SharedMonitorStats {
    Arc::new(MonitorStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedMonitorStats {
    Arc::new(MonitorStats::with_persistence(path))
}
