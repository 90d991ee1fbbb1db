//! Core functionality for the GLOF monitor.
//!
//! This module contains:
//! - The classifier port and bundled logistic model
//! - Risk scoring with cached contributing factors
//! - Rolling history windows
//! - The escalation policy state machine
//! - The evaluation engine tying them together

pub mod alert;
pub mod engine;
pub mod history;
pub mod model;
pub mod scorer;

// Re-export commonly used types
pub use alert::{cooldown_ticks, AlertDecision, AlertPolicy, AlertState, DEFAULT_THRESHOLD};
pub use engine::{Monitor, MonitorSettings, TickReport};
pub use history::{HistoryBuffer, HistorySet, HistorySnapshot, DEFAULT_HISTORY_CAPACITY};
pub use model::{Classifier, LogisticModel, ModelError, ModelFeature};
pub use scorer::{clamp_probability, perturb, RiskAssessment, RiskScorer, ScoreError};
