//! In-memory Storage Gateway
//!
//! Thread-safe via `RwLock`. Not durable; data is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use super::{StorageError, StorageGateway};
use crate::types::{Prediction, RecordId, SensorReading};

#[derive(Default)]
pub struct InMemoryStorage {
    readings: RwLock<Vec<SensorReading>>,
    predictions: RwLock<Vec<Prediction>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total readings across all stations.
    pub fn reading_count(&self) -> usize {
        self.readings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Total predictions across all stations.
    pub fn prediction_count(&self) -> usize {
        self.predictions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn allocate_id(&self) -> RecordId {
        RecordId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl StorageGateway for InMemoryStorage {
    async fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, StorageError> {
        self.ensure_open()?;
        let id = self.allocate_id();
        let mut store = self.readings.write().unwrap_or_else(|e| e.into_inner());
        store.push(reading.clone().with_id(id.clone()));
        Ok(id)
    }

    async fn latest_reading(&self, station_id: &str) -> Result<Option<SensorReading>, StorageError> {
        self.ensure_open()?;
        let store = self.readings.read().unwrap_or_else(|e| e.into_inner());
        // Later inserts win ties, matching the sled key order
        Ok(store
            .iter()
            .enumerate()
            .filter(|(_, r)| r.station_id == station_id)
            .max_by_key(|(i, r)| (r.timestamp, *i))
            .map(|(_, r)| r.clone()))
    }

    async fn readings_since(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StorageError> {
        self.ensure_open()?;
        let store = self.readings.read().unwrap_or_else(|e| e.into_inner());
        let mut readings: Vec<SensorReading> = store
            .iter()
            .filter(|r| r.station_id == station_id && r.timestamp >= since)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    async fn insert_prediction(&self, prediction: &Prediction) -> Result<RecordId, StorageError> {
        self.ensure_open()?;
        let id = self.allocate_id();
        let mut store = self.predictions.write().unwrap_or_else(|e| e.into_inner());
        store.push(prediction.clone().with_id(id.clone()));
        Ok(id)
    }

    async fn latest_prediction(&self, station_id: &str) -> Result<Option<Prediction>, StorageError> {
        self.ensure_open()?;
        let store = self.predictions.read().unwrap_or_else(|e| e.into_inner());
        Ok(store
            .iter()
            .enumerate()
            .filter(|(_, p)| p.station_id == station_id)
            .max_by_key(|(i, p)| (p.prediction_timestamp, *i))
            .map(|(_, p)| p.clone()))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let store = InMemoryStorage::new();
        let now = Utc::now();
        for (mins, air) in [(5, 105), (50, 150), (20, 120), (13 * 60, 999)] {
            let r = SensorReading::new("station_01", now - Duration::minutes(mins), 25.0, 50.0, air, 10.0);
            store.insert_reading(&r).await.unwrap();
        }

        let history = store.history("station_01", 12).await.unwrap();
        let values: Vec<i64> = history.iter().map(|r| r.air_value).collect();
        assert_eq!(values, vec![105, 120, 150]);
        assert!(history.iter().all(|r| r.id.is_some()));

        let latest = store.latest_reading("station_01").await.unwrap().unwrap();
        assert_eq!(latest.air_value, 105);
        assert!(store.latest_reading("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = InMemoryStorage::new();
        let r = SensorReading::new("station_01", Utc::now(), 25.0, 50.0, 100, 10.0);
        let a = store.insert_reading(&r).await.unwrap();
        let b = store.insert_reading(&r).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.reading_count(), 2);
    }

    #[tokio::test]
    async fn test_close_rejects_writes() {
        let store = InMemoryStorage::new();
        store.close().await.unwrap();
        let r = SensorReading::new("station_01", Utc::now(), 25.0, 50.0, 100, 10.0);
        assert!(matches!(store.insert_reading(&r).await, Err(StorageError::Closed)));
    }
}
