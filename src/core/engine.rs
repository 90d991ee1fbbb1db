//! The evaluation engine: one tick of source → scorer → history → policy.
//!
//! A tick either applies completely (history append and alert transition
//! together) or not at all. Scoring runs before anything is mutated, so a
//! snapshot that fails to score leaves the history and alert state exactly as
//! they were.

use crate::core::alert::{AlertDecision, AlertPolicy, AlertState};
use crate::core::history::HistorySet;
use crate::core::scorer::{perturb, RiskAssessment, RiskScorer, ScoreError};
use crate::dashboard::DashboardSnapshot;
use crate::sensor::{SensorSnapshot, SensorSource};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Tunables for the engine, derived from the configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub threshold: f64,
    pub cooldown_ticks: u64,
    pub history_capacity: usize,
    pub tracked_sensors: Vec<String>,
    /// Standard deviation of noise added to the model probability
    pub probability_jitter: f64,
    /// Standard deviation of the projected-risk spread
    pub projection_spread: f64,
}

/// Everything one successful tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub snapshot: SensorSnapshot,
    /// Assessment with jitter already applied and clamped
    pub assessment: RiskAssessment,
    pub projected: f64,
    pub decision: AlertDecision,
}

impl TickReport {
    /// True when this tick must dispatch a notification.
    pub fn escalated(&self) -> bool {
        self.decision.notify
    }
}

/// Owns all evaluation state. The runner is its only caller.
pub struct Monitor {
    source: SensorSource,
    scorer: RiskScorer,
    history: HistorySet,
    policy: AlertPolicy,
    rng: StdRng,
    probability_jitter: f64,
    projection_spread: f64,
    threshold: f64,
    next_tick: u64,
    last_report: Option<TickReport>,
    last_updated: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(source: SensorSource, scorer: RiskScorer, settings: MonitorSettings) -> Self {
        Self::with_rng(source, scorer, settings, StdRng::from_entropy())
    }

    /// Reproducible engine for tests.
    pub fn seeded(
        source: SensorSource,
        scorer: RiskScorer,
        settings: MonitorSettings,
        seed: u64,
    ) -> Self {
        Self::with_rng(source, scorer, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        source: SensorSource,
        scorer: RiskScorer,
        settings: MonitorSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            source,
            scorer,
            history: HistorySet::new(settings.history_capacity, settings.tracked_sensors),
            policy: AlertPolicy::new(settings.threshold, settings.cooldown_ticks),
            rng,
            probability_jitter: settings.probability_jitter,
            projection_spread: settings.projection_spread,
            threshold: settings.threshold,
            next_tick: 0,
            last_report: None,
            last_updated: None,
        }
    }

    /// Pull a snapshot from the source and evaluate it.
    pub fn tick(&mut self) -> Result<TickReport, ScoreError> {
        let snapshot = self.source.sample();
        self.evaluate(snapshot)
    }

    /// Evaluate a snapshot as the next tick.
    ///
    /// The tick clock advances even when scoring fails, since the cooldown
    /// is measured in elapsed ticks.
    pub fn evaluate(&mut self, snapshot: SensorSnapshot) -> Result<TickReport, ScoreError> {
        let t = self.next_tick;
        self.next_tick += 1;

        let raw = self.scorer.score(&snapshot)?;

        let missing: Vec<String> = self
            .history
            .tracked_sensors()
            .filter(|name| snapshot.get(name).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ScoreError::FeatureMismatch { missing });
        }

        let probability = if self.probability_jitter > 0.0 {
            perturb(raw.probability, self.probability_jitter, &mut self.rng)
        } else {
            raw.probability
        };
        let projected = perturb(probability, self.projection_spread, &mut self.rng);

        self.history.record(probability, projected, snapshot.values());
        let decision = self.policy.evaluate(probability, t);

        let report = TickReport {
            tick: t,
            snapshot,
            assessment: RiskAssessment {
                probability,
                contributing_factors: raw.contributing_factors,
            },
            projected,
            decision,
        };
        self.last_report = Some(report.clone());
        self.last_updated = Some(Utc::now());
        Ok(report)
    }

    pub fn history(&self) -> &HistorySet {
        &self.history
    }

    pub fn alert_state(&self) -> AlertState {
        self.policy.state()
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Ticks attempted so far, including skipped ones.
    pub fn ticks(&self) -> u64 {
        self.next_tick
    }

    /// Read-only view for render sinks. Reflects the last good tick.
    pub fn dashboard(&self) -> DashboardSnapshot {
        let report = self.last_report.as_ref();
        DashboardSnapshot {
            tick: report.map(|r| r.tick),
            updated_at: self.last_updated,
            threshold: self.threshold,
            latest_probability: report.map(|r| r.assessment.probability),
            contributing_factors: report
                .map(|r| r.assessment.contributing_factors.clone())
                .unwrap_or_default(),
            alert_state: self.policy.state(),
            last_escalation: self.policy.last_escalation(),
            latest_readings: report
                .map(|r| r.snapshot.values().clone())
                .unwrap_or_default(),
            history: self.history.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::LogisticModel;
    use crate::sensor::GenerationStrategy;

    fn settings() -> MonitorSettings {
        MonitorSettings {
            threshold: 0.7,
            cooldown_ticks: 5,
            history_capacity: 4,
            tracked_sensors: vec!["Water_Level_m".to_string()],
            probability_jitter: 0.0,
            projection_spread: 0.1,
        }
    }

    fn monitor() -> Monitor {
        Monitor::seeded(
            SensorSource::seeded(GenerationStrategy::RandomWalk, 1),
            RiskScorer::new(Box::new(LogisticModel::bundled().unwrap())),
            settings(),
            1,
        )
    }

    #[test]
    fn test_ticks_fill_history_up_to_capacity() {
        let mut monitor = monitor();
        for _ in 0..10 {
            monitor.tick().expect("generated snapshots always score");
        }
        assert_eq!(monitor.history().len(), 4);
        assert_eq!(monitor.history().sensor("Water_Level_m").unwrap().len(), 4);
        assert_eq!(monitor.ticks(), 10);
    }

    #[test]
    fn test_dashboard_before_first_tick_is_empty() {
        let dashboard = monitor().dashboard();
        assert_eq!(dashboard.tick, None);
        assert!(dashboard.history.probability.is_empty());
        assert_eq!(dashboard.alert_state, AlertState::Normal);
    }

    #[test]
    fn test_projected_risk_is_clamped() {
        let mut monitor = monitor();
        for _ in 0..50 {
            let report = monitor.tick().unwrap();
            assert!((0.0..=1.0).contains(&report.projected));
        }
    }
}
