//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Values that operators can tune
//! live in `StationConfig`; these are the fixed ones plus the defaults the
//! config structs fall back to.

// ============================================================================
// Station / MQTT
// ============================================================================

pub const DEFAULT_STATION_ID: &str = "station_01";

pub const DEFAULT_MQTT_BROKER: &str = "broker.hivemq.com";

pub const DEFAULT_MQTT_PORT: u16 = 1883;

pub const DEFAULT_MQTT_TOPIC: &str = "home/trungvu/airquality";

pub const DEFAULT_MQTT_CLIENT_ID: &str = "server_listener";

pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 60;

/// Capacity of the queue between the MQTT thread and the async dispatcher.
pub const DEFAULT_MQTT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Prediction Scheduler
// ============================================================================

pub const DEFAULT_PREDICTION_INTERVAL_MINUTES: u64 = 30;

/// Look-back window used by each scheduled prediction (hours).
pub const DEFAULT_PREDICTION_HISTORY_HOURS: u32 = 12;

/// Scheduled iterations with fewer readings than this are skipped.
pub const DEFAULT_MIN_READINGS_FOR_PREDICTION: usize = 10;

/// On-demand predictions need at least this many readings.
pub const MIN_READINGS_ON_DEMAND: usize = 5;

pub const DEFAULT_ALERT_THRESHOLD_AQI: u16 = 150;

/// 7 days of history for training.
pub const DEFAULT_TRAINING_HOURS: u32 = 168;

// ============================================================================
// Forecast Engine
// ============================================================================

/// Observations per model input window.
pub const DEFAULT_FORECAST_WINDOW: usize = 24;

/// Readings averaged by the fallback forecaster.
pub const FALLBACK_AVERAGE_WINDOW: usize = 10;

pub const DEFAULT_MODEL_PATH: &str = "data/forecast_model.json";

/// Training requests below this many readings are rejected by the API.
pub const MIN_READINGS_FOR_TRAINING: usize = 100;

pub const DEFAULT_TRAINING_EPOCHS: usize = 50;

pub const DEFAULT_TRAINING_BATCH_SIZE: usize = 32;

pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

pub const DEFAULT_VALIDATION_SPLIT: f64 = 0.2;

// ============================================================================
// Simulation
// ============================================================================

pub const DEFAULT_SIMULATION_TICK_SECS: u64 = 5;

// ============================================================================
// Broadcast / HTTP
// ============================================================================

/// Per-subscriber outbound queue depth. A subscriber whose queue is full
/// is treated as a failed send and disconnected.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8000";

/// Upper bound for `/data/history?hours=`.
pub const MAX_HISTORY_QUERY_HOURS: u32 = 168;

pub const MIN_TRAINING_QUERY_HOURS: u32 = 24;

pub const MAX_TRAINING_QUERY_HOURS: u32 = 720;

// ============================================================================
// Storage / Alerts
// ============================================================================

pub const DEFAULT_STORAGE_PATH: &str = "./data/airwatch.db";

pub const DEFAULT_ALERT_TIMEOUT_SECS: u64 = 10;
