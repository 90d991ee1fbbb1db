//! Rolling history windows for dashboard series.
//!
//! Each tracked quantity (risk probability, projected risk, selected raw
//! sensors) keeps a fixed-capacity window. Appending past capacity evicts the
//! oldest values first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default number of values kept per series.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// A fixed-capacity FIFO window of values.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    capacity: usize,
    values: VecDeque<f64>,
}

impl HistoryBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a value, evicting from the front until within capacity.
    pub fn append(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Current contents, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Most recent value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read-only copy of every tracked series at one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub probability: Vec<f64>,
    pub projected: Vec<f64>,
    pub sensors: BTreeMap<String, Vec<f64>>,
}

/// All series the evaluation loop tracks, advanced together once per tick.
#[derive(Debug, Clone)]
pub struct HistorySet {
    probability: HistoryBuffer,
    projected: HistoryBuffer,
    sensors: BTreeMap<String, HistoryBuffer>,
}

impl HistorySet {
    /// Create a set tracking probability, projected risk, and the named sensors.
    pub fn new<I, S>(capacity: usize, tracked_sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sensors = tracked_sensors
            .into_iter()
            .map(|name| (name.into(), HistoryBuffer::new(capacity)))
            .collect();

        Self {
            probability: HistoryBuffer::new(capacity),
            projected: HistoryBuffer::new(capacity),
            sensors,
        }
    }

    /// Append one tick's worth of values.
    ///
    /// `sensor_values` must hold a value for every tracked sensor; callers
    /// check this before mutating anything so a tick is all-or-nothing.
    pub fn record(
        &mut self,
        probability: f64,
        projected: f64,
        sensor_values: &BTreeMap<String, f64>,
    ) {
        self.probability.append(probability);
        self.projected.append(projected);
        for (name, buffer) in self.sensors.iter_mut() {
            if let Some(value) = sensor_values.get(name) {
                buffer.append(*value);
            }
        }
    }

    /// Names of the tracked raw sensors.
    pub fn tracked_sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(|s| s.as_str())
    }

    pub fn probability(&self) -> &HistoryBuffer {
        &self.probability
    }

    pub fn projected(&self) -> &HistoryBuffer {
        &self.projected
    }

    pub fn sensor(&self, name: &str) -> Option<&HistoryBuffer> {
        self.sensors.get(name)
    }

    /// Number of ticks currently held (same for every series).
    pub fn len(&self) -> usize {
        self.probability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probability.is_empty()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            probability: self.probability.values(),
            projected: self.projected.values(),
            sensors: self
                .sensors
                .iter()
                .map(|(name, buffer)| (name.clone(), buffer.values()))
                .collect(),
        }
    }
}
