//! Storage Gateway - append-only persistence for readings and predictions
//!
//! The pipeline only sees the `StorageGateway` trait so backends can be
//! swapped without touching ingestion or scheduling code:
//! - `SledStorage`: embedded sled database, the production backend
//! - `InMemoryStorage`: volatile store for tests and `--memory-storage`
//!
//! Records are never updated once written.

mod memory;
mod sled_store;

pub use memory::InMemoryStorage;
pub use sled_store::SledStorage;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::types::{Prediction, RecordId, SensorReading};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage is closed")]
    Closed,
}

/// Pluggable persistence backend.
///
/// Implementations must be thread-safe; one instance is shared by the
/// bridge, the simulation loop, the scheduler and the HTTP handlers.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Append a reading and return its opaque id.
    async fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, StorageError>;

    /// Newest reading for a station, if any.
    async fn latest_reading(&self, station_id: &str) -> Result<Option<SensorReading>, StorageError>;

    /// Readings with `timestamp >= since`, oldest first.
    async fn readings_since(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StorageError>;

    /// Append a prediction and return its opaque id.
    async fn insert_prediction(&self, prediction: &Prediction) -> Result<RecordId, StorageError>;

    /// Newest prediction for a station, if any.
    async fn latest_prediction(&self, station_id: &str) -> Result<Option<Prediction>, StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Flush and refuse further operations.
    async fn close(&self) -> Result<(), StorageError>;

    /// Readings from the last `hours`, most recent first.
    async fn history(&self, station_id: &str, hours: u32) -> Result<Vec<SensorReading>, StorageError> {
        let since = Utc::now() - Duration::hours(i64::from(hours));
        let mut readings = self.readings_since(station_id, since).await?;
        readings.reverse();
        Ok(readings)
    }

    /// Readings from the last `hours`, oldest first (model training order).
    async fn training_data(
        &self,
        station_id: &str,
        hours: u32,
    ) -> Result<Vec<SensorReading>, StorageError> {
        let since = Utc::now() - Duration::hours(i64::from(hours));
        self.readings_since(station_id, since).await
    }
}
