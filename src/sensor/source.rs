//! Simulated lake station producing one snapshot per tick.
//!
//! Two strategies are supported:
//! - `Uniform`: every field drawn independently from its valid range.
//! - `RandomWalk`: each field wanders from its baseline with a slow drift,
//!   small Gaussian noise, and rare additive spikes.

use crate::sensor::types::{SensorField, SensorSnapshot};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;

/// Probability that a field spikes on any given tick.
pub const SPIKE_PROBABILITY: f64 = 0.02;

/// Per-tick noise, as a fraction of the field's range.
const NOISE_FRACTION: f64 = 0.01;

/// Per-tick change of the drift term, as a fraction of the range.
const DRIFT_STEP_FRACTION: f64 = 0.001;

/// Drift never exceeds this fraction of the range per tick.
const MAX_DRIFT_FRACTION: f64 = 0.005;

/// Spike magnitude bounds, as fractions of the range.
const SPIKE_MIN_FRACTION: f64 = 0.05;
const SPIKE_MAX_FRACTION: f64 = 0.15;

/// How sensor values are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    Uniform,
    #[default]
    RandomWalk,
}

impl GenerationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStrategy::Uniform => "uniform",
            GenerationStrategy::RandomWalk => "random_walk",
        }
    }
}

impl std::str::FromStr for GenerationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "uniform" => Ok(GenerationStrategy::Uniform),
            "random_walk" | "walk" => Ok(GenerationStrategy::RandomWalk),
            other => Err(format!("unknown generation strategy '{other}'")),
        }
    }
}

/// Draw from `N(0, sigma)`. A non-positive sigma yields no noise.
pub(crate) fn gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    if sigma.is_nan() || sigma <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, sigma) {
        Ok(normal) => normal.inverse_cdf(rng.gen_range(f64::EPSILON..1.0)),
        Err(_) => 0.0,
    }
}

#[derive(Debug, Clone, Copy)]
struct WalkState {
    value: f64,
    drift: f64,
}

/// Produces sensor snapshots. Owns all of its random-walk state.
pub struct SensorSource {
    strategy: GenerationStrategy,
    rng: StdRng,
    walk: BTreeMap<SensorField, WalkState>,
}

impl SensorSource {
    /// Create a source seeded from system entropy.
    pub fn new(strategy: GenerationStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    /// Create a reproducible source.
    pub fn seeded(strategy: GenerationStrategy, seed: u64) -> Self {
        Self::with_rng(strategy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(strategy: GenerationStrategy, rng: StdRng) -> Self {
        let walk = SensorField::ALL
            .iter()
            .map(|field| {
                (
                    *field,
                    WalkState {
                        value: field.baseline(),
                        drift: 0.0,
                    },
                )
            })
            .collect();

        Self {
            strategy,
            rng,
            walk,
        }
    }

    /// Produce the next snapshot.
    pub fn sample(&mut self) -> SensorSnapshot {
        match self.strategy {
            GenerationStrategy::Uniform => self.sample_uniform(),
            GenerationStrategy::RandomWalk => self.step_walk(),
        }
    }

    fn sample_uniform(&mut self) -> SensorSnapshot {
        let rng = &mut self.rng;
        let values: Vec<(SensorField, f64)> = SensorField::ALL
            .iter()
            .map(|field| {
                let (min, max) = field.range();
                (*field, rng.gen_range(min..=max))
            })
            .collect();
        SensorSnapshot::from_fields(Utc::now(), values)
    }

    fn step_walk(&mut self) -> SensorSnapshot {
        let rng = &mut self.rng;
        for (field, state) in self.walk.iter_mut() {
            let span = field.span();
            let max_drift = span * MAX_DRIFT_FRACTION;

            state.drift = (state.drift + gaussian(rng, span * DRIFT_STEP_FRACTION))
                .clamp(-max_drift, max_drift);

            let mut next = state.value + state.drift + gaussian(rng, span * NOISE_FRACTION);

            if rng.gen_bool(SPIKE_PROBABILITY) {
                let magnitude =
                    span * rng.gen_range(SPIKE_MIN_FRACTION..=SPIKE_MAX_FRACTION);
                next += if rng.gen_bool(0.5) { magnitude } else { -magnitude };
            }

            state.value = field.clamp_value(next);
        }

        SensorSnapshot::from_fields(
            Utc::now(),
            self.walk.iter().map(|(field, state)| (*field, state.value)),
        )
    }
}

impl Iterator for SensorSource {
    type Item = SensorSnapshot;

    /// Never returns `None`.
    fn next(&mut self) -> Option<SensorSnapshot> {
        Some(self.sample())
    }
}
