//! Station Configuration - every tunable value of the station server
//!
//! Each section implements `Default` with the values the server shipped
//! with, so a missing config file means stock behaviour.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::forecast::Feature;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AIRWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "airwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one station deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub station: StationInfo,

    /// Telemetry broker connection
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Scheduled prediction and alert policy
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Forecast model shape and artifact location
    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Notifier credentials
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl StationConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that exists but fails to parse or validate is an error; a
    /// missing file falls through to the next candidate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::locate_and_parse(explicit)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn locate_and_parse(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Command line
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), station = %config.station.id, "Loaded station config");
            return Ok(config);
        }

        // 2. Env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), station = %config.station.id, "Loaded station config from AIRWATCH_CONFIG");
                return Ok(config);
            }
            warn!(path = %path, "AIRWATCH_CONFIG points to non-existent file, falling back");
        }

        // 3. ./airwatch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(station = %config.station.id, "Loaded station config from ./airwatch.toml");
            return Ok(config);
        }

        // 4. Defaults
        info!("No airwatch.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Parse a specific TOML file. Unknown keys are logged, not rejected.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and range-check a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Override secrets and the listen address from the environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a closure.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.alerts.telegram_bot_token = Some(token);
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()) {
            self.alerts.telegram_chat_id = Some(chat);
        }
        if let Some(addr) = lookup("AIRWATCH_SERVER_ADDR").filter(|v| !v.is_empty()) {
            self.server.addr = addr;
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Range-check every section; all violations are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationInfo {
    #[serde(default = "default_station_id")]
    pub id: String,
}

fn default_station_id() -> String {
    defaults::DEFAULT_STATION_ID.to_string()
}

impl Default for StationInfo {
    fn default() -> Self {
        Self { id: default_station_id() }
    }
}

/// Telemetry broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Start the bridge at boot (`--no-mqtt` also disables it)
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mqtt_broker")]
    pub broker: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Depth of the thread-to-runtime handoff queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_true() -> bool { true }
fn default_mqtt_broker() -> String { defaults::DEFAULT_MQTT_BROKER.to_string() }
fn default_mqtt_port() -> u16 { defaults::DEFAULT_MQTT_PORT }
fn default_mqtt_topic() -> String { defaults::DEFAULT_MQTT_TOPIC.to_string() }
fn default_mqtt_client_id() -> String { defaults::DEFAULT_MQTT_CLIENT_ID.to_string() }
fn default_keep_alive_secs() -> u64 { defaults::DEFAULT_MQTT_KEEP_ALIVE_SECS }
fn default_channel_capacity() -> usize { defaults::DEFAULT_MQTT_CHANNEL_CAPACITY }

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: default_mqtt_broker(),
            port: default_mqtt_port(),
            topic: default_mqtt_topic(),
            client_id: default_mqtt_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Scheduled prediction loop and alert threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Sleep between scheduler iterations (minutes)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Look-back window for each scheduled prediction (hours)
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,

    /// Iterations with fewer readings are skipped
    #[serde(default = "default_min_readings")]
    pub min_readings: usize,

    /// Predictions strictly above this AQI trigger an alert
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold_aqi: u16,

    /// Default look-back for training requests (hours)
    #[serde(default = "default_training_hours")]
    pub training_hours: u32,
}

fn default_interval_minutes() -> u64 { defaults::DEFAULT_PREDICTION_INTERVAL_MINUTES }
fn default_history_hours() -> u32 { defaults::DEFAULT_PREDICTION_HISTORY_HOURS }
fn default_min_readings() -> usize { defaults::DEFAULT_MIN_READINGS_FOR_PREDICTION }
fn default_alert_threshold() -> u16 { defaults::DEFAULT_ALERT_THRESHOLD_AQI }
fn default_training_hours() -> u32 { defaults::DEFAULT_TRAINING_HOURS }

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            history_hours: default_history_hours(),
            min_readings: default_min_readings(),
            alert_threshold_aqi: default_alert_threshold(),
            training_hours: default_training_hours(),
        }
    }
}

/// Forecast model shape, training hyperparameters and artifact path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Observations per input window
    #[serde(default = "default_window")]
    pub window: usize,

    /// Input columns, in order
    #[serde(default = "default_features")]
    pub features: Vec<Feature>,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_validation_split")]
    pub validation_split: f64,
}

fn default_window() -> usize { defaults::DEFAULT_FORECAST_WINDOW }
fn default_features() -> Vec<Feature> { Feature::DEFAULT_SET.to_vec() }
fn default_model_path() -> PathBuf { PathBuf::from(defaults::DEFAULT_MODEL_PATH) }
fn default_epochs() -> usize { defaults::DEFAULT_TRAINING_EPOCHS }
fn default_batch_size() -> usize { defaults::DEFAULT_TRAINING_BATCH_SIZE }
fn default_learning_rate() -> f64 { defaults::DEFAULT_LEARNING_RATE }
fn default_validation_split() -> f64 { defaults::DEFAULT_VALIDATION_SPLIT }

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            features: default_features(),
            model_path: default_model_path(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            validation_split: default_validation_split(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds between synthetic readings
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Also write synthetic readings to storage (broadcast only when false)
    #[serde(default)]
    pub persist_readings: bool,
}

fn default_tick_secs() -> u64 { defaults::DEFAULT_SIMULATION_TICK_SECS }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            persist_readings: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Outbound queue depth per live subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_subscriber_buffer() -> usize { defaults::DEFAULT_SUBSCRIBER_BUFFER }

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { subscriber_buffer: default_subscriber_buffer() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf { PathBuf::from(defaults::DEFAULT_STORAGE_PATH) }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String { defaults::DEFAULT_SERVER_ADDR.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_server_addr() }
    }
}

/// Telegram credentials. Both must be set for alerts to be delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,
}

fn default_alert_timeout() -> u64 { defaults::DEFAULT_ALERT_TIMEOUT_SECS }

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_chat_id: None,
            timeout_secs: default_alert_timeout(),
        }
    }
}
