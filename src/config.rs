//! Configuration for the GLOF monitor.

use crate::core::alert::{cooldown_ticks, DEFAULT_THRESHOLD};
use crate::core::engine::MonitorSettings;
use crate::core::history::DEFAULT_HISTORY_CAPACITY;
use crate::core::model::LogisticModel;
use crate::notify::dispatcher::{DispatcherConfig, DEFAULT_NOTIFY_TIMEOUT, DEFAULT_RETRY_BACKOFF};
use crate::notify::geo::{Coordinates, MonitoredSite, SafeLocation};
use crate::sensor::{GenerationStrategy, SensorField};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Escalate when the risk probability is strictly above this
    pub threshold: f64,

    /// Quiet period after an escalation
    #[serde(with = "duration_serde")]
    pub cooldown_duration: Duration,

    /// Length of every history series
    pub history_capacity: usize,

    /// Time between ticks
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    pub generation_strategy: GenerationStrategy,

    /// Evacuation points, in priority order for ties
    pub safe_locations: Vec<SafeLocation>,

    /// The lake being monitored
    pub site: MonitoredSite,

    /// Raw sensors kept in history for the dashboard
    pub tracked_sensors: Vec<String>,

    /// Gaussian noise (σ) added to the model probability; 0 disables it
    pub probability_jitter: f64,

    /// Gaussian spread (σ) of the projected-risk series
    pub projection_spread: f64,

    /// Upper bound for a single notification send
    #[serde(with = "duration_serde")]
    pub notify_timeout: Duration,

    /// Retry a failed notification once
    pub notify_retry: bool,

    #[serde(with = "duration_serde")]
    pub retry_backoff: Duration,

    /// Classifier JSON; the bundled model is used when unset
    pub model_path: Option<PathBuf>,

    /// Path for storing run statistics
    pub data_path: PathBuf,

    /// Whether evaluation is currently paused
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glof-monitor");

        Self {
            threshold: DEFAULT_THRESHOLD,
            cooldown_duration: Duration::from_secs(300), // 5 minutes
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tick_interval: Duration::from_secs(2),
            generation_strategy: GenerationStrategy::default(),
            safe_locations: default_safe_locations(),
            site: default_site(),
            tracked_sensors: vec![
                SensorField::WaterLevel.name().to_string(),
                SensorField::Precipitation.name().to_string(),
                SensorField::AirTemperature.name().to_string(),
            ],
            probability_jitter: 0.0,
            projection_spread: 0.05,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            notify_retry: true,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            model_path: None,
            data_path: data_dir,
            paused: false,
        }
    }
}

/// Imja Tsho, Khumbu region, Nepal.
fn default_site() -> MonitoredSite {
    MonitoredSite {
        name: "Imja Tsho".to_string(),
        coordinates: Coordinates::new(27.8983, 86.9250),
        timezone: "Asia/Kathmandu".to_string(),
    }
}

fn default_safe_locations() -> Vec<SafeLocation> {
    vec![
        SafeLocation::new("Namche Bazaar", 27.8050, 86.7139),
        SafeLocation::new("Dingboche", 27.8925, 86.8306),
        SafeLocation::new("Pangboche", 27.8577, 86.7944),
    ]
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glof-monitor")
            .join("config.json")
    }

    /// Where cumulative run statistics are persisted.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("monitor_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be at least 1 second".to_string(),
            ));
        }
        if self.cooldown_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "cooldown_duration must be at least 1 second".to_string(),
            ));
        }
        if self.notify_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "notify_timeout must be at least 1 second".to_string(),
            ));
        }
        for (name, sigma) in [
            ("probability_jitter", self.probability_jitter),
            ("projection_spread", self.projection_spread),
        ] {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {sigma}"
                )));
            }
        }

        for location in &self.safe_locations {
            if location.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "safe location with an empty name".to_string(),
                ));
            }
            if !location.coordinates.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "safe location '{}' has invalid coordinates ({}, {})",
                    location.name, location.coordinates.lat, location.coordinates.lon
                )));
            }
        }

        if !self.site.coordinates.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "site '{}' has invalid coordinates",
                self.site.name
            )));
        }
        if self.site.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown timezone '{}'",
                self.site.timezone
            )));
        }

        if let Some(unknown) = self
            .tracked_sensors
            .iter()
            .find(|name| SensorField::from_name(name).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "unknown tracked sensor '{unknown}'"
            )));
        }

        Ok(())
    }

    /// Engine settings derived from this configuration.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            threshold: self.threshold,
            cooldown_ticks: cooldown_ticks(self.cooldown_duration, self.tick_interval),
            history_capacity: self.history_capacity,
            tracked_sensors: self.tracked_sensors.clone(),
            probability_jitter: self.probability_jitter,
            projection_spread: self.projection_spread,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            timeout: self.notify_timeout,
            retry: self.notify_retry,
            backoff: self.retry_backoff,
        }
    }

    /// Load the configured classifier, or the bundled one.
    pub fn load_model(&self) -> Result<LogisticModel, ConfigError> {
        let model = match &self.model_path {
            Some(path) => LogisticModel::load(path),
            None => LogisticModel::bundled(),
        };
        model.map_err(|e| ConfigError::Invalid(format!("classifier could not be loaded: {e}")))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    /// A required environment variable is missing or blank
    MissingCredential(String),
    /// A setting is out of range or inconsistent
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::MissingCredential(key) => {
                write!(f, "Missing credential: environment variable {key} is not set")
            }
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
