//! AirWatch: air quality station server
//!
//! Real-time telemetry fan-out with synthetic data mode and AQI forecasting.
//!
//! ## Architecture
//!
//! - **Telemetry Bridge**: MQTT client thread -> bounded queue -> ordered ingestion
//! - **Simulation Engine**: scenario-driven synthetic readings, suppresses real data while active
//! - **Broadcast Hub**: per-subscriber bounded queues behind the `/ws` endpoint
//! - **Forecast Engine**: window regressor with a moving-average fallback
//! - **Prediction Scheduler**: periodic forecast, persistence and alerting

pub mod alerts;
pub mod api;
pub mod aqi;
pub mod broadcast;
pub mod config;
pub mod forecast;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod simulation;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::StationConfig;

// Re-export commonly used types
pub use types::{ModelType, Prediction, RecordId, Scenario, SensorReading};

// Re-export core services
pub use alerts::AlertManager;
pub use broadcast::BroadcastHub;
pub use forecast::ForecastEngine;
pub use pipeline::TelemetryBridge;
pub use scheduler::PredictionScheduler;
pub use services::Services;
pub use simulation::SimulationEngine;

// Re-export storage
pub use storage::{InMemoryStorage, SledStorage, StorageError, StorageGateway};
