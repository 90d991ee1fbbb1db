//! GLOF Monitor CLI
//!
//! Glacial lake outburst flood risk monitor with SMS alerting.

use clap::{Parser, Subcommand};
use glof_monitor_agent::{
    config::Config,
    core::{Monitor, RiskScorer},
    dashboard::create_shared_dashboard,
    notify::{
        nearest_safe_location, transport::ENV_TO, DistancePort, DryRunMessenger, Haversine,
        NotificationDispatcher, SmsConfig, SmsGateway, Transport,
    },
    runner::{shutdown_channel, Runner, ShutdownHandle, TickOutcome},
    sensor::{GenerationStrategy, SensorSnapshot, SensorSource},
    telemetry::{create_shared_stats_with_persistence, PersistedStats},
    DISCLAIMER, VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glof-monitor")]
#[command(version = VERSION)]
#[command(about = "Glacial lake outburst flood risk monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitoring loop
    Start {
        /// Log alerts instead of sending SMS
        #[arg(long)]
        dry_run: bool,

        /// Escalation threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Seconds between ticks (overrides config)
        #[arg(long)]
        tick_interval: Option<u64>,

        /// Sensor generation strategy: uniform or random_walk (overrides config)
        #[arg(long)]
        strategy: Option<GenerationStrategy>,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Serve the dashboard over HTTP on this port (requires server feature)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Pause risk evaluation
    Pause,

    /// Resume risk evaluation
    Resume,

    /// Show current monitor status
    Status,

    /// Show configuration
    Config,

    /// Score a sensor snapshot from a JSON file
    Score {
        /// JSON object mapping sensor names to values
        file: PathBuf,
    },

    /// List safe locations and their distance from the site
    Locations,

    /// Display the operating disclaimer
    Disclaimer,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            dry_run,
            threshold,
            tick_interval,
            strategy,
            ticks,
            port,
        } => {
            cmd_start(dry_run, threshold, tick_interval, strategy, ticks, port);
        }
        Commands::Pause => {
            cmd_pause();
        }
        Commands::Resume => {
            cmd_resume();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::Score { file } => {
            cmd_score(&file);
        }
        Commands::Locations => {
            cmd_locations();
        }
        Commands::Disclaimer => {
            cmd_disclaimer();
        }
    }
}

/// Load the config file, exiting on a malformed file.
fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config {:?}: {e}", Config::config_path());
            std::process::exit(1);
        }
    }
}

#[allow(unused_variables)]
fn cmd_start(
    dry_run: bool,
    threshold: Option<f64>,
    tick_interval: Option<u64>,
    strategy: Option<GenerationStrategy>,
    ticks: Option<u64>,
    port: Option<u16>,
) {
    println!("GLOF Monitor Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(threshold) = threshold {
        config.threshold = threshold;
    }
    if let Some(secs) = tick_interval {
        config.tick_interval = std::time::Duration::from_secs(secs);
    }
    if let Some(strategy) = strategy {
        config.generation_strategy = strategy;
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let model = match config.load_model() {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let (transport, recipient) = if dry_run {
        let recipient = std::env::var(ENV_TO).unwrap_or_else(|_| "dry-run".to_string());
        (Transport::DryRun(DryRunMessenger), recipient)
    } else {
        let sms = match SmsConfig::from_env() {
            Ok(sms) => sms,
            Err(e) => {
                eprintln!("Error: {e}");
                eprintln!();
                eprintln!("Set the SMS gateway credentials in the environment,");
                eprintln!("or run with --dry-run to log alerts instead of sending them.");
                std::process::exit(1);
            }
        };
        let recipient = sms.to.clone();
        match SmsGateway::new(sms) {
            Ok(gateway) => (Transport::Sms(gateway), recipient),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    };

    let settings = config.monitor_settings();
    println!("Starting monitor...");
    println!(
        "  Site: {} ({})",
        config.site.name, config.site.coordinates
    );
    println!("  Model: {}", model.name);
    println!("  Threshold: {:.2}", config.threshold);
    println!(
        "  Tick interval: {}s, cooldown: {}s ({} ticks)",
        config.tick_interval.as_secs(),
        config.cooldown_duration.as_secs(),
        settings.cooldown_ticks
    );
    println!("  Sensors: {}", config.generation_strategy.as_str());
    println!("  Transport: {}", transport.name());
    println!("  Safe locations: {}", config.safe_locations.len());
    if config.safe_locations.is_empty() {
        eprintln!(
            "Warning: No safe locations configured; alerts will carry no evacuation guidance."
        );
    }

    #[cfg(not(feature = "server"))]
    if port.is_some() {
        eprintln!("Warning: --port ignored (server feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let dashboard = create_shared_dashboard();
    let stats = create_shared_stats_with_persistence(config.stats_path());

    let monitor = Monitor::new(
        SensorSource::new(config.generation_strategy),
        RiskScorer::new(Box::new(model)),
        settings,
    );
    let dispatcher = NotificationDispatcher::new(
        transport,
        recipient,
        config.site.clone(),
        config.safe_locations.clone(),
        config.dispatcher_config(),
    );

    let mut runner = Runner::new(
        monitor,
        dispatcher,
        dashboard.clone(),
        stats.clone(),
        config.tick_interval,
    )
    .with_pause_file(Config::config_path());
    if let Some(ticks) = ticks {
        runner = runner.with_max_ticks(ticks);
    }

    // Set up Ctrl+C handler
    let (shutdown, shutdown_rx) = shutdown_channel();
    ctrlc_handler(shutdown);

    if config.paused {
        println!("Monitoring is currently paused.");
        println!("Run `glof-monitor resume` to start evaluating.");
        println!();
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        #[cfg(feature = "server")]
        let server = match port {
            Some(port) => {
                match glof_monitor_agent::server::run(
                    glof_monitor_agent::server::ServerConfig::new(port),
                    dashboard.clone(),
                    stats.clone(),
                )
                .await
                {
                    Ok((addr, shutdown_tx)) => {
                        println!("Dashboard available at http://{addr}/dashboard");
                        Some(shutdown_tx)
                    }
                    Err(e) => {
                        eprintln!("Warning: Could not start dashboard server: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        runner.run(shutdown_rx, render_tick).await;

        #[cfg(feature = "server")]
        if let Some(shutdown_tx) = server {
            let _ = shutdown_tx.send(());
        }
    });

    println!();
    println!("Stopping monitor...");
    println!();
    println!("{}", stats.summary());
}

/// Console render sink.
fn render_tick(outcome: &TickOutcome) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match outcome {
        TickOutcome::Evaluated {
            report,
            notification,
        } => {
            println!(
                "[{now}] tick {} | risk {:.2} (projected {:.2}) | {} | factors: {}",
                report.tick,
                report.assessment.probability,
                report.projected,
                report.decision.state,
                report.assessment.contributing_factors.join(", ")
            );
            match notification {
                Some(Ok(ack)) => println!("[{now}] ALERT sent ({})", ack.message_id),
                Some(Err(e)) => eprintln!("[{now}] ALERT not delivered: {e}"),
                None => {}
            }
        }
        TickOutcome::Skipped(e) => {
            eprintln!("[{now}] tick skipped: {e}");
        }
    }
}

fn cmd_pause() {
    let mut config = load_config();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Monitoring paused. Use 'glof-monitor resume' to continue.");
}

fn cmd_resume() {
    let mut config = load_config();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Monitoring resumed.");
}

fn cmd_status() {
    let config = load_config();

    println!("GLOF Monitor Status");
    println!("===================");
    println!();

    let credentials = SmsConfig::from_env();
    println!(
        "SMS credentials: {}",
        match &credentials {
            Ok(_) => "Configured ✓".to_string(),
            Err(e) => format!("Not configured ✗ ({e})"),
        }
    );
    println!();

    println!("Configuration:");
    println!("  Site: {} ({})", config.site.name, config.site.coordinates);
    println!("  Threshold: {:.2}", config.threshold);
    println!("  Tick interval: {}s", config.tick_interval.as_secs());
    println!("  Cooldown: {}s", config.cooldown_duration.as_secs());
    println!("  Sensors: {}", config.generation_strategy.as_str());
    println!("  Safe locations: {}", config.safe_locations.len());
    println!("  Paused: {}", config.paused);
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        match PersistedStats::read(&stats_path) {
            Ok(stats) => {
                println!("Cumulative Statistics ({}):", stats.station);
                println!("  Ticks evaluated: {}", stats.ticks_evaluated);
                println!("  Ticks skipped: {}", stats.ticks_skipped);
                println!("  Escalations: {}", stats.escalations);
                println!("  Notifications sent: {}", stats.notifications_sent);
                println!("  Notifications failed: {}", stats.notifications_failed);
                if let Some(error) = stats.last_notify_error {
                    println!("  Last notification error: {error}");
                }
                println!("  Last updated: {}", stats.last_updated.to_rfc3339());
            }
            Err(e) => eprintln!("Warning: Could not read statistics: {e}"),
        }
    } else {
        println!("No previous run data found.");
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_score(file: &Path) {
    let config = load_config();

    let snapshot = match std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|json| SensorSnapshot::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error reading snapshot {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let scorer = match config.load_model() {
        Ok(model) => RiskScorer::new(Box::new(model)),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match scorer.score(&snapshot) {
        Ok(assessment) => {
            println!("Risk probability: {:.3}", assessment.probability);
            println!(
                "Contributing factors: {}",
                assessment.contributing_factors.join(", ")
            );
            println!(
                "Above threshold ({:.2}): {}",
                config.threshold,
                if assessment.probability > config.threshold {
                    "yes"
                } else {
                    "no"
                }
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_locations() {
    let config = load_config();
    let from = config.site.coordinates;

    println!("Safe locations from {} ({})", config.site.name, from);
    println!();

    if config.safe_locations.is_empty() {
        println!("No safe locations configured.");
        return;
    }

    let nearest = nearest_safe_location(&Haversine, from, &config.safe_locations);
    for location in &config.safe_locations {
        let marker = match &nearest {
            Some(n) if n.location == *location => " (nearest)",
            _ => "",
        };
        println!(
            "  {:<20} {}  {:>7.1} km{marker}",
            location.name,
            location.coordinates,
            Haversine.distance_km(from, location.coordinates)
        );
    }
}

fn cmd_disclaimer() {
    println!("{DISCLAIMER}");
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: ShutdownHandle) {
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown.shutdown();
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
