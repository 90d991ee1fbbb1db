//! The scheduled evaluation loop.
//!
//! One tick completes before the next begins. A stop signal is checked
//! between ticks and interrupts the inter-tick sleep. While the config file
//! says `paused`, no ticks are evaluated.

use crate::config::Config;
use crate::core::engine::{Monitor, TickReport};
use crate::core::scorer::ScoreError;
use crate::dashboard::SharedDashboard;
use crate::notify::dispatcher::{NotificationDispatcher, NotifyError};
use crate::notify::message::EscalationContext;
use crate::notify::transport::{Ack, Messenger};
use crate::sensor::SensorSnapshot;
use crate::telemetry::SharedMonitorStats;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How often the config file is re-read for pause/resume.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Requests a running loop to stop. Cloneable and usable from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Ask the loop to stop after the current tick.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Create a stop signal and the receiver the runner listens on.
pub fn shutdown_channel() -> (ShutdownHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx: Arc::new(tx) }, rx)
}

/// What one pass of the loop did.
#[derive(Debug)]
pub enum TickOutcome {
    Evaluated {
        report: TickReport,
        /// Present only when this tick escalated
        notification: Option<Result<Ack, NotifyError>>,
    },
    Skipped(ScoreError),
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped(_))
    }
}

/// Drives a [`Monitor`] on a schedule and dispatches escalations.
pub struct Runner<M: Messenger> {
    monitor: Monitor,
    dispatcher: NotificationDispatcher<M>,
    dashboard: SharedDashboard,
    stats: SharedMonitorStats,
    tick_interval: Duration,
    pause_file: Option<PathBuf>,
    max_ticks: Option<u64>,
}

impl<M: Messenger> Runner<M> {
    pub fn new(
        monitor: Monitor,
        dispatcher: NotificationDispatcher<M>,
        dashboard: SharedDashboard,
        stats: SharedMonitorStats,
        tick_interval: Duration,
    ) -> Self {
        Self {
            monitor,
            dispatcher,
            dashboard,
            stats,
            tick_interval,
            pause_file: None,
            max_ticks: None,
        }
    }

    /// Poll this config file for the `paused` flag.
    pub fn with_pause_file(mut self, path: PathBuf) -> Self {
        self.pause_file = Some(path);
        self
    }

    /// Stop on its own after `ticks` passes.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher<M> {
        &self.dispatcher
    }

    /// Sample the source and run one tick.
    pub async fn step(&mut self) -> TickOutcome {
        let result = self.monitor.tick();
        self.apply(result).await
    }

    /// Run one tick on a supplied snapshot.
    pub async fn step_snapshot(&mut self, snapshot: SensorSnapshot) -> TickOutcome {
        let result = self.monitor.evaluate(snapshot);
        self.apply(result).await
    }

    async fn apply(&mut self, result: Result<TickReport, ScoreError>) -> TickOutcome {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(tick = self.monitor.ticks().saturating_sub(1), "Skipping tick: {e}");
                self.stats.record_tick_skipped();
                return TickOutcome::Skipped(e);
            }
        };

        self.stats.record_tick_evaluated();
        debug!(
            tick = report.tick,
            probability = report.assessment.probability,
            projected = report.projected,
            state = %report.decision.state,
            "Tick evaluated"
        );

        // Publish before dispatch so readers see the escalation immediately.
        *self.dashboard.write().await = self.monitor.dashboard();

        let notification = if report.escalated() {
            self.stats.record_escalation();
            info!(
                tick = report.tick,
                probability = report.assessment.probability,
                factors = ?report.assessment.contributing_factors,
                "Risk above threshold, escalating"
            );

            let context = EscalationContext {
                tick: report.tick,
                probability: report.assessment.probability,
                contributing_factors: report.assessment.contributing_factors.clone(),
                timestamp: report.snapshot.captured_at(),
            };
            let result = self.dispatcher.dispatch(&context).await;
            match &result {
                Ok(_) => self.stats.record_notification_sent(),
                Err(e) => self.stats.record_notification_failed(e),
            }
            Some(result)
        } else {
            None
        };

        TickOutcome::Evaluated {
            report,
            notification,
        }
    }

    /// Run until shutdown (or `max_ticks`), calling `render` after every tick.
    ///
    /// Dropping every [`ShutdownHandle`] also stops the loop.
    pub async fn run<F>(&mut self, mut shutdown: watch::Receiver<bool>, mut render: F)
    where
        F: FnMut(&TickOutcome),
    {
        info!(
            interval = ?self.tick_interval,
            transport_recipient = self.dispatcher.recipient(),
            site = %self.dispatcher.site().name,
            "Monitor loop started"
        );

        let mut paused = false;
        let mut last_pause_check: Option<Instant> = None;
        let mut passes = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(path) = &self.pause_file {
                if last_pause_check.map_or(true, |t| t.elapsed() >= PAUSE_POLL_INTERVAL) {
                    // Blocking read of a small file; the loop runs on a
                    // current-thread runtime with nothing else to starve.
                    match Config::load_from(path) {
                        Ok(cfg) if cfg.paused != paused => {
                            paused = cfg.paused;
                            if paused {
                                info!("Monitoring paused");
                            } else {
                                info!("Monitoring resumed");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => debug!("Could not re-read config: {e}"),
                    }
                    last_pause_check = Some(Instant::now());
                }
            }

            if paused {
                if wait_or_shutdown(&mut shutdown, PAUSE_POLL_INTERVAL).await {
                    break;
                }
                continue;
            }

            let outcome = self.step().await;
            render(&outcome);

            passes += 1;
            if self.max_ticks.is_some_and(|max| passes >= max) {
                break;
            }

            if wait_or_shutdown(&mut shutdown, self.tick_interval).await {
                break;
            }
        }

        info!(ticks = self.monitor.ticks(), "Monitor loop stopped");
        if let Err(e) = self.stats.save() {
            warn!("Could not save monitor stats: {e}");
        }
    }
}

/// Sleep for `duration`. Returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            Err(_) => true,
        },
    }
}
