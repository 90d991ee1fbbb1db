//! GLOF Monitor Agent - glacial lake outburst flood risk monitoring.
//!
//! This library evaluates a stream of lake sensor readings against a risk
//! classifier, keeps rolling history for dashboards, and sends a single SMS
//! alert with evacuation guidance when the risk crosses a threshold.
//!
//! # Guarantees
//!
//! - **One alert per escalation**: notifications fire only on `Normal → Escalated`
//! - **Atomic ticks**: a snapshot that cannot be scored changes nothing
//! - **Failures are not fatal**: delivery errors are logged and counted, the loop continues
//! - **No embedded secrets**: gateway credentials come from the environment
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GLOF Monitor Agent                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Sensor    │──▶│    Risk     │──▶│   History   │       │
//! │  │   Source    │   │   Scorer    │   │   Buffers   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │              │
//! │                           ▼                 ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │    Alert    │   │  Dashboard  │       │
//! │                    │   Policy    │   │  Snapshot   │       │
//! │                    └─────────────┘   └─────────────┘       │
//! │                           │ escalation                     │
//! │                           ▼                                │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │ Dispatcher  │──▶│  SMS / Dry  │       │
//! │                    │ (nearest)   │   │    Run      │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use glof_monitor_agent::{Config, Monitor, RiskScorer, SensorSource};
//!
//! let config = Config::default();
//! let model = config.load_model().expect("bundled model");
//! let mut monitor = Monitor::new(
//!     SensorSource::new(config.generation_strategy),
//!     RiskScorer::new(Box::new(model)),
//!     config.monitor_settings(),
//! );
//!
//! let report = monitor.tick().expect("generated snapshots carry every feature");
//! println!("risk {:.2}", report.assessment.probability);
//! ```

pub mod config;
pub mod core;
pub mod dashboard;
pub mod notify;
pub mod runner;
pub mod sensor;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    AlertPolicy, AlertState, Classifier, LogisticModel, Monitor, MonitorSettings, RiskAssessment,
    RiskScorer, ScoreError, TickReport,
};
pub use dashboard::{create_shared_dashboard, DashboardSnapshot, SharedDashboard};
pub use notify::{
    DispatcherConfig, DryRunMessenger, Messenger, NotificationDispatcher, NotifyError,
    SafeLocation, SmsConfig, SmsGateway, Transport,
};
pub use runner::{shutdown_channel, Runner, ShutdownHandle, TickOutcome};
pub use sensor::{GenerationStrategy, SensorField, SensorSnapshot, SensorSource};
pub use telemetry::{MonitorStats, SharedMonitorStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Operating disclaimer that can be displayed to users.
pub const DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              GLOF MONITOR AGENT - OPERATING DISCLAIMER           ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent estimates glacial lake outburst flood risk from      ║
║  sensor readings and sends early-warning text messages.          ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Scores each set of readings with a trained classifier       ║
║    • Sends one alert when risk crosses the configured threshold  ║
║    • Names the nearest configured safe location with a map link  ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT DO:                                          ║
║    • Guarantee that every flood will be detected                 ║
║    • Replace official warnings or local evacuation orders        ║
║    • Retry alerts beyond a single attempt after failure          ║
║                                                                  ║
║  Readings may be simulated. Always follow instructions from      ║
║  local authorities.                                              ║
║                                                                  ║
║  You can view run statistics anytime with:                       ║
║    glof-monitor status                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
