//! Integration tests for notification dispatch and the evaluation loop

use chrono::Utc;
use glof_monitor_agent::config::Config;
use glof_monitor_agent::core::{
    AlertState, Classifier, LogisticModel, Monitor, MonitorSettings, RiskScorer,
};
use glof_monitor_agent::dashboard::create_shared_dashboard;
use glof_monitor_agent::notify::{
    Ack, Coordinates, DispatcherConfig, DistancePort, DryRunMessenger, EscalationContext,
    Messenger, MonitoredSite, NotificationDispatcher, NotifyError, SafeLocation, TransportError,
};
use glof_monitor_agent::runner::{shutdown_channel, Runner, TickOutcome};
use glof_monitor_agent::sensor::{GenerationStrategy, SensorSnapshot, SensorSource};
use glof_monitor_agent::telemetry::create_shared_stats;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Never answers within any reasonable timeout.
struct StalledMessenger;

impl Messenger for StalledMessenger {
    async fn send(&self, _to: &str, _body: &str) -> Result<Ack, TransportError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Ack {
            message_id: "late".to_string(),
        })
    }
}

/// Fails the first `failures` calls with a 503.
struct FlakyMessenger {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyMessenger {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Messenger for FlakyMessenger {
    async fn send(&self, _to: &str, _body: &str) -> Result<Ack, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(TransportError::Server {
                status: 503,
                message: "unavailable".to_string(),
            })
        } else {
            Ok(Ack {
                message_id: format!("SM{call}"),
            })
        }
    }
}

/// Keeps every message it is asked to send.
#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Messenger for RecordingMessenger {
    async fn send(&self, to: &str, body: &str) -> Result<Ack, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(Ack {
            message_id: "SM-recorded".to_string(),
        })
    }
}

/// Reports the water level reading itself as the outburst probability.
struct WaterLevelAsRisk {
    names: Vec<String>,
}

impl Classifier for WaterLevelAsRisk {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        features[0]
    }

    fn feature_importances(&self) -> Vec<(String, f64)> {
        vec![("Water_Level_m".to_string(), 1.0)]
    }
}

/// Ranks locations by how far their latitude is from the site, reversed.
struct FarthestLatitudeFirst;

impl DistancePort for FarthestLatitudeFirst {
    fn distance_km(&self, a: Coordinates, b: Coordinates) -> f64 {
        100.0 - (a.lat - b.lat).abs() * 100.0
    }
}

fn site() -> MonitoredSite {
    MonitoredSite {
        name: "Imja Tsho".to_string(),
        coordinates: Coordinates::new(27.8983, 86.9250),
        timezone: "Asia/Kathmandu".to_string(),
    }
}

fn khumbu() -> Vec<SafeLocation> {
    vec![
        SafeLocation::new("Namche Bazaar", 27.8050, 86.7139),
        SafeLocation::new("Dingboche", 27.8925, 86.8306),
        SafeLocation::new("Pangboche", 27.8577, 86.7944),
    ]
}

fn fast(retry: bool) -> DispatcherConfig {
    DispatcherConfig {
        timeout: Duration::from_millis(50),
        retry,
        backoff: Duration::from_millis(10),
    }
}

fn context() -> EscalationContext {
    EscalationContext {
        tick: 2,
        probability: 0.8,
        contributing_factors: vec!["Water_Level_m".to_string()],
        timestamp: Utc::now(),
    }
}

fn water_level(p: f64) -> SensorSnapshot {
    let mut values = BTreeMap::new();
    values.insert("Water_Level_m".to_string(), p);
    SensorSnapshot::new(Utc::now(), values)
}

fn scripted_monitor() -> Monitor {
    Monitor::seeded(
        SensorSource::seeded(GenerationStrategy::Uniform, 1),
        RiskScorer::new(Box::new(WaterLevelAsRisk {
            names: vec!["Water_Level_m".to_string()],
        })),
        MonitorSettings {
            threshold: 0.7,
            cooldown_ticks: 5,
            history_capacity: 20,
            tracked_sensors: vec!["Water_Level_m".to_string()],
            probability_jitter: 0.0,
            projection_spread: 0.0,
        },
        1,
    )
}

#[tokio::test]
async fn test_timeout_becomes_notify_error() {
    let dispatcher =
        NotificationDispatcher::new(StalledMessenger, "+9771", site(), khumbu(), fast(false));

    let err = dispatcher.dispatch(&context()).await.unwrap_err();
    assert_eq!(err, NotifyError::Timeout(Duration::from_millis(50)));
}

#[tokio::test]
async fn test_single_retry_recovers_transient_failure() {
    let dispatcher = NotificationDispatcher::new(
        FlakyMessenger::new(1),
        "+9771",
        site(),
        khumbu(),
        fast(true),
    );

    let ack = dispatcher.dispatch(&context()).await.unwrap();
    assert_eq!(ack.message_id, "SM1");
    assert_eq!(dispatcher.messenger().calls(), 2);
}

#[tokio::test]
async fn test_retry_gives_up_after_second_failure() {
    let dispatcher = NotificationDispatcher::new(
        FlakyMessenger::new(5),
        "+9771",
        site(),
        khumbu(),
        fast(true),
    );

    let err = dispatcher.dispatch(&context()).await.unwrap_err();
    assert!(matches!(
        err,
        NotifyError::Transport(TransportError::Server { status: 503, .. })
    ));
    assert_eq!(dispatcher.messenger().calls(), 2);
}

#[tokio::test]
async fn test_no_retry_when_disabled() {
    let dispatcher = NotificationDispatcher::new(
        FlakyMessenger::new(1),
        "+9771",
        site(),
        khumbu(),
        fast(false),
    );

    assert!(dispatcher.dispatch(&context()).await.is_err());
    assert_eq!(dispatcher.messenger().calls(), 1);
}

#[tokio::test]
async fn test_message_names_nearest_safe_location() {
    let dispatcher = NotificationDispatcher::new(
        RecordingMessenger::default(),
        "+9771",
        site(),
        khumbu(),
        fast(false),
    );

    dispatcher.dispatch(&context()).await.unwrap();

    let sent = dispatcher.messenger().sent();
    assert_eq!(sent.len(), 1);
    let (to, body) = &sent[0];
    assert_eq!(to, "+9771");
    assert!(body.contains("Nearest safe location: Dingboche"));
    assert!(body.contains("9.3 km"));
    assert!(body.contains("https://www.google.com/maps?q=27.898300,86.925000"));
    assert!(body.contains("https://www.google.com/maps?q=27.892500,86.830600"));
}

#[tokio::test]
async fn test_injected_distance_port_picks_location() {
    let dispatcher = NotificationDispatcher::new(
        RecordingMessenger::default(),
        "+9771",
        site(),
        khumbu(),
        fast(false),
    )
    .with_distance(Box::new(FarthestLatitudeFirst));

    let event = dispatcher.prepare(&context());
    assert_eq!(event.nearest_location.unwrap().name, "Namche Bazaar");
    assert!((event.distance_km.unwrap() - 90.67).abs() < 1e-6);

    dispatcher.dispatch(&context()).await.unwrap();
    let sent = dispatcher.messenger().sent();
    assert!(sent[0].1.contains("Nearest safe location: Namche Bazaar"));
    assert!(sent[0].1.contains("90.7 km away"));
}

#[tokio::test]
async fn test_empty_safe_locations_still_sends_base_alert() {
    let dispatcher = NotificationDispatcher::new(
        RecordingMessenger::default(),
        "+9771",
        site(),
        Vec::new(),
        fast(false),
    );

    dispatcher.dispatch(&context()).await.unwrap();

    let sent = dispatcher.messenger().sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.starts_with("GLOF ALERT"));
    assert!(sent[0].1.contains("No safe location available"));
}

#[tokio::test]
async fn test_timeout_still_enters_cooldown_and_loop_continues() {
    let stats = create_shared_stats();
    let dispatcher =
        NotificationDispatcher::new(StalledMessenger, "+9771", site(), khumbu(), fast(false));
    let mut runner = Runner::new(
        scripted_monitor(),
        dispatcher,
        create_shared_dashboard(),
        stats.clone(),
        Duration::from_millis(10),
    );

    runner.step_snapshot(water_level(0.2)).await;
    let outcome = runner.step_snapshot(water_level(0.9)).await;
    match outcome {
        TickOutcome::Evaluated {
            report,
            notification: Some(Err(NotifyError::Timeout(_))),
        } => assert!(report.escalated()),
        other => panic!("expected a timed-out escalation, got {other:?}"),
    }

    let next = runner.step_snapshot(water_level(0.95)).await;
    match next {
        TickOutcome::Evaluated {
            report,
            notification,
        } => {
            assert!(notification.is_none());
            assert_eq!(report.decision.state, AlertState::Cooldown { until: 6 });
        }
        other => panic!("expected a normal tick, got {other:?}"),
    }

    let snapshot = stats.stats();
    assert_eq!(snapshot.escalations, 1);
    assert_eq!(snapshot.notifications_failed, 1);
    assert_eq!(snapshot.notifications_sent, 0);
    assert_eq!(snapshot.ticks_evaluated, 3);
    assert!(snapshot.last_notify_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_skipped_tick_is_counted() {
    let stats = create_shared_stats();
    let dashboard = create_shared_dashboard();
    let dispatcher =
        NotificationDispatcher::new(DryRunMessenger, "+9771", site(), khumbu(), fast(false));
    let mut runner = Runner::new(
        scripted_monitor(),
        dispatcher,
        dashboard.clone(),
        stats.clone(),
        Duration::from_millis(10),
    );

    runner.step_snapshot(water_level(0.3)).await;
    let outcome = runner
        .step_snapshot(SensorSnapshot::new(Utc::now(), BTreeMap::new()))
        .await;
    assert!(outcome.is_skipped());

    assert_eq!(stats.stats().ticks_skipped, 1);
    assert_eq!(runner.monitor().history().len(), 1);
    assert_eq!(dashboard.read().await.tick, Some(0));
}

#[tokio::test]
async fn test_run_publishes_dashboard_and_stops_after_max_ticks() {
    let stats = create_shared_stats();
    let dashboard = create_shared_dashboard();
    let monitor = Monitor::seeded(
        SensorSource::seeded(GenerationStrategy::RandomWalk, 9),
        RiskScorer::new(Box::new(LogisticModel::bundled().unwrap())),
        Config::default().monitor_settings(),
        9,
    );
    let dispatcher =
        NotificationDispatcher::new(DryRunMessenger, "+9771", site(), khumbu(), fast(false));
    let mut runner = Runner::new(
        monitor,
        dispatcher,
        dashboard.clone(),
        stats.clone(),
        Duration::from_millis(5),
    )
    .with_max_ticks(3);

    let (_shutdown, rx) = shutdown_channel();
    let mut rendered = 0;
    runner.run(rx, |_| rendered += 1).await;

    assert_eq!(rendered, 3);
    assert_eq!(stats.stats().ticks_evaluated, 3);

    let published = dashboard.read().await;
    assert_eq!(published.tick, Some(2));
    assert_eq!(published.history.probability.len(), 3);
    assert_eq!(published.history.sensors["Water_Level_m"].len(), 3);
}

#[tokio::test]
async fn test_shutdown_interrupts_sleep() {
    let dispatcher =
        NotificationDispatcher::new(DryRunMessenger, "+9771", site(), khumbu(), fast(false));
    let mut runner = Runner::new(
        scripted_monitor(),
        dispatcher,
        create_shared_dashboard(),
        create_shared_stats(),
        Duration::from_secs(3600),
    );

    let (shutdown, rx) = shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
    });

    let started = std::time::Instant::now();
    runner.run(rx, |_| {}).await;

    // The first tick ran, then the hour-long sleep was cut short.
    assert_eq!(runner.monitor().ticks(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_paused_config_prevents_ticks() {
    let dir = std::env::temp_dir().join(format!("glof-pause-{}", uuid::Uuid::new_v4()));
    let path = dir.join("config.json");
    Config {
        paused: true,
        ..Config::default()
    }
    .save_to(&path)
    .unwrap();

    let dispatcher =
        NotificationDispatcher::new(DryRunMessenger, "+9771", site(), khumbu(), fast(false));
    let mut runner = Runner::new(
        scripted_monitor(),
        dispatcher,
        create_shared_dashboard(),
        create_shared_stats(),
        Duration::from_millis(5),
    )
    .with_pause_file(path.clone());

    let (shutdown, rx) = shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.shutdown();
    });

    runner.run(rx, |_| {}).await;
    assert_eq!(runner.monitor().ticks(), 0);

    let _ = std::fs::remove_dir_all(dir);
}
