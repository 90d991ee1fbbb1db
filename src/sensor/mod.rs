//! Simulated sensor input for the GLOF monitor.
//!
//! This module provides the sensor catalog, the snapshot type, and the
//! simulated station that generates one reading per tick.

pub mod source;
pub mod types;

// Re-export commonly used types
pub use source::{GenerationStrategy, SensorSource, SPIKE_PROBABILITY};
pub use types::{SensorField, SensorSnapshot};
