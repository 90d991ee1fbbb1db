//! Escalation policy: threshold check plus a mandatory cooldown.
//!
//! States and transitions, evaluated once per tick `t`:
//!
//! ```text
//! Normal    --(p >  threshold)-->  Escalated   (notify once, cooldown_until = t + cooldown)
//! Normal    --(p <= threshold)-->  Normal
//! Escalated --(always)---------->  Cooldown
//! Cooldown  --(t <  until)------>  Cooldown    (never notifies)
//! Cooldown  --(t >= until)------>  Normal      (threshold re-checked in the same tick)
//! ```
//!
//! A notification is only requested on entry into `Escalated`, and the
//! expiry check only runs from `Cooldown`, so two alerts are always at
//! least two ticks apart.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default escalation threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Alert state as seen by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    Normal,
    /// Escalation fired at tick `since`; quiet until `cooldown_until`.
    Escalated { since: u64, cooldown_until: u64 },
    /// Quiet period after an escalation.
    Cooldown { until: u64 },
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Normal => write!(f, "normal"),
            AlertState::Escalated { cooldown_until, .. } => {
                write!(f, "escalated (quiet until tick {cooldown_until})")
            }
            AlertState::Cooldown { until } => write!(f, "cooldown (until tick {until})"),
        }
    }
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub previous: AlertState,
    pub state: AlertState,
    /// A notification must be dispatched for this tick.
    pub notify: bool,
}

/// Convert a wall-clock cooldown into whole ticks, rounding up. Never zero.
pub fn cooldown_ticks(cooldown: Duration, tick_interval: Duration) -> u64 {
    if tick_interval.is_zero() {
        return cooldown.as_secs().max(1);
    }
    let ticks = (cooldown.as_secs_f64() / tick_interval.as_secs_f64()).ceil();
    (ticks as u64).max(1)
}

/// Threshold + cooldown state machine. The only writer of [`AlertState`].
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    threshold: f64,
    cooldown_ticks: u64,
    state: AlertState,
    last_escalation: Option<u64>,
}

impl AlertPolicy {
    pub fn new(threshold: f64, cooldown_ticks: u64) -> Self {
        Self {
            threshold,
            cooldown_ticks: cooldown_ticks.max(1),
            state: AlertState::Normal,
            last_escalation: None,
        }
    }

    /// Apply one tick's transition.
    pub fn evaluate(&mut self, probability: f64, t: u64) -> AlertDecision {
        let previous = self.state;

        let settled = match self.state {
            AlertState::Escalated { cooldown_until, .. } => AlertState::Cooldown {
                until: cooldown_until,
            },
            AlertState::Cooldown { until } if t >= until => AlertState::Normal,
            AlertState::Cooldown { until } => AlertState::Cooldown { until },
            AlertState::Normal => AlertState::Normal,
        };

        let (state, notify) = if settled == AlertState::Normal && probability > self.threshold {
            self.last_escalation = Some(t);
            (
                AlertState::Escalated {
                    since: t,
                    cooldown_until: t + self.cooldown_ticks,
                },
                true,
            )
        } else {
            (settled, false)
        };

        self.state = state;
        AlertDecision {
            previous,
            state,
            notify,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn cooldown_ticks(&self) -> u64 {
        self.cooldown_ticks
    }

    /// Tick of the most recent transition into `Escalated`.
    pub fn last_escalation(&self) -> Option<u64> {
        self.last_escalation
    }
}
