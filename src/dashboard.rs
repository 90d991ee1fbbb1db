//! Render sink interface.
//!
//! The evaluation loop publishes a [`DashboardSnapshot`] once per tick into a
//! [`SharedDashboard`]. The loop is the only writer; the console renderer and
//! the HTTP server only read.

use crate::core::alert::AlertState;
use crate::core::history::HistorySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a dashboard needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// Last successfully evaluated tick
    pub tick: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub threshold: f64,
    pub latest_probability: Option<f64>,
    pub contributing_factors: Vec<String>,
    pub alert_state: AlertState,
    pub last_escalation: Option<u64>,
    pub latest_readings: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub history: HistorySnapshot,
}

impl DashboardSnapshot {
    /// One-line summary for console output.
    pub fn status_line(&self) -> String {
        let probability = self
            .latest_probability
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let factors = if self.contributing_factors.is_empty() {
            "none".to_string()
        } else {
            self.contributing_factors.join(", ")
        };
        format!(
            "risk {probability} (threshold {:.2}) | state: {} | factors: {factors}",
            self.threshold, self.alert_state
        )
    }
}

/// Single-writer, multi-reader cell holding the latest snapshot.
pub type SharedDashboard = Arc<RwLock<DashboardSnapshot>>;

/// Create an empty shared dashboard.
pub fn create_shared_dashboard() -> SharedDashboard {
    Arc::new(RwLock::new(DashboardSnapshot::default()))
}
