//! sled-backed Storage Gateway
//!
//! Two trees, `readings` and `predictions`. Keys are
//! `station_id | 0x00 | timestamp_micros (order-preserving BE) | sequence (BE)`,
//! so a range scan over one station's prefix yields records in time order.
//! Values are the JSON-serialized record with its id filled in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::{StorageError, StorageGateway};
use crate::types::{Prediction, RecordId, SensorReading};

const READINGS_TREE: &str = "readings";
const PREDICTIONS_TREE: &str = "predictions";

/// Embedded sled database holding readings and predictions.
pub struct SledStorage {
    db: sled::Db,
    readings: sled::Tree,
    predictions: sled::Tree,
    closed: AtomicBool,
}

impl SledStorage {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = sled::open(path)?;
        let readings = db.open_tree(READINGS_TREE)?;
        let predictions = db.open_tree(PREDICTIONS_TREE)?;
        info!(
            path = %path.display(),
            readings = readings.len(),
            predictions = predictions.len(),
            "Opened sled storage"
        );
        Ok(Self {
            db,
            readings,
            predictions,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn insert<T: serde::Serialize>(
        &self,
        tree: &sled::Tree,
        station_id: &str,
        timestamp: DateTime<Utc>,
        record: &T,
    ) -> Result<RecordId, StorageError> {
        self.ensure_open()?;
        let seq = self.db.generate_id()?;
        let id = RecordId::from(seq);

        // Store with the id attached so reads return it
        let mut value = serde_json::to_value(record)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("_id".to_string(), serde_json::Value::String(id.0.clone()));
        }
        tree.insert(record_key(station_id, timestamp, seq), serde_json::to_vec(&value)?)?;
        Ok(id)
    }

    fn last_in_prefix<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        station_id: &str,
    ) -> Result<Option<T>, StorageError> {
        self.ensure_open()?;
        let (start, end) = station_bounds(station_id);
        match tree.range(start..end).next_back() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageGateway for SledStorage {
    async fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, StorageError> {
        let id = self.insert(&self.readings, &reading.station_id, reading.timestamp, reading)?;
        debug!(id = %id, station_id = %reading.station_id, "Reading stored");
        Ok(id)
    }

    async fn latest_reading(&self, station_id: &str) -> Result<Option<SensorReading>, StorageError> {
        self.last_in_prefix(&self.readings, station_id)
    }

    async fn readings_since(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StorageError> {
        self.ensure_open()?;
        let start = record_key(station_id, since, 0);
        let (_, end) = station_bounds(station_id);

        let mut readings = Vec::new();
        for item in self.readings.range(start..end) {
            let (key, value) = item?;
            match serde_json::from_slice::<SensorReading>(&value) {
                Ok(reading) => readings.push(reading),
                Err(e) => warn!(key = ?key, error = %e, "Skipping undecodable reading"),
            }
        }
        Ok(readings)
    }

    async fn insert_prediction(&self, prediction: &Prediction) -> Result<RecordId, StorageError> {
        let id = self.insert(
            &self.predictions,
            &prediction.station_id,
            prediction.prediction_timestamp,
            prediction,
        )?;
        debug!(id = %id, station_id = %prediction.station_id, "Prediction stored");
        Ok(id)
    }

    async fn latest_prediction(&self, station_id: &str) -> Result<Option<Prediction>, StorageError> {
        self.last_in_prefix(&self.predictions, station_id)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let bytes = self.db.flush_async().await?;
        info!(flushed_bytes = bytes, "sled storage closed");
        Ok(())
    }
}

// ============================================================================
// Key encoding
// ============================================================================

/// Flip the sign bit so negative timestamps still sort before positive ones.
fn encode_timestamp(ts: DateTime<Utc>) -> [u8; 8] {
    ((ts.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}

fn record_key(station_id: &str, ts: DateTime<Utc>, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(station_id.len() + 17);
    key.extend_from_slice(station_id.as_bytes());
    key.push(0x00);
    key.extend_from_slice(&encode_timestamp(ts));
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Half-open key range covering every record of `station_id`.
fn station_bounds(station_id: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = station_id.as_bytes().to_vec();
    start.push(0x00);
    let mut end = station_id.as_bytes().to_vec();
    end.push(0x01);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelType;
    use chrono::Duration;

    fn reading_at(ts: DateTime<Utc>, air_value: i64) -> SensorReading {
        SensorReading::new("station_01", ts, 25.0, 50.0, air_value, 12.0)
    }

    #[test]
    fn test_keys_sort_by_time_then_sequence() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(1);
        assert!(record_key("s", t0, 9) < record_key("s", t1, 0));
        assert!(record_key("s", t0, 1) < record_key("s", t0, 2));
        let before_epoch = DateTime::<Utc>::from_timestamp(-10, 0).unwrap();
        assert!(record_key("s", before_epoch, 0) < record_key("s", t0, 0));
    }

    #[test]
    fn test_station_bounds_exclude_longer_ids() {
        let (start, end) = station_bounds("station_01");
        let other = record_key("station_010", Utc::now(), 0);
        assert!(!(start.as_slice() <= other.as_slice() && other.as_slice() < end.as_slice()));
    }

    #[tokio::test]
    async fn test_insert_and_query_in_time_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStorage::open(dir.path().join("db")).unwrap();
        let now = Utc::now();

        // Insert out of order; reads come back sorted by timestamp
        for (mins, air) in [(30, 130), (90, 190), (10, 110)] {
            store.insert_reading(&reading_at(now - Duration::minutes(mins), air)).await.unwrap();
        }
        store
            .insert_reading(&SensorReading::new("other", now, 20.0, 40.0, 999, 1.0))
            .await
            .unwrap();

        let latest = store.latest_reading("station_01").await.unwrap().unwrap();
        assert_eq!(latest.air_value, 110);
        assert!(latest.id.is_some());

        let history = store.history("station_01", 1).await.unwrap();
        let values: Vec<i64> = history.iter().map(|r| r.air_value).collect();
        assert_eq!(values, vec![110, 130]);

        let training = store.training_data("station_01", 2).await.unwrap();
        let values: Vec<i64> = training.iter().map(|r| r.air_value).collect();
        assert_eq!(values, vec![190, 130, 110]);
    }

    #[tokio::test]
    async fn test_predictions_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStorage::open(dir.path().join("db")).unwrap();
        assert!(store.latest_prediction("station_01").await.unwrap().is_none());

        let now = Utc::now();
        let older = Prediction::new("station_01", now - Duration::minutes(30), 80, ModelType::Fallback, 12, true);
        let newer = Prediction::new("station_01", now, 95, ModelType::Fallback, 14, true);
        store.insert_prediction(&newer).await.unwrap();
        store.insert_prediction(&older).await.unwrap();

        let latest = store.latest_prediction("station_01").await.unwrap().unwrap();
        assert_eq!(latest.predicted_aqi, 95);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStorage::open(dir.path().join("db")).unwrap();
        store.close().await.unwrap();
        let err = store.insert_reading(&reading_at(Utc::now(), 100)).await.unwrap_err();
        assert!(matches!(err, StorageError::Closed));
        // Closing twice is harmless
        store.close().await.unwrap();
    }

    #[test]
    fn test_unwritable_parent_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let result = SledStorage::open(blocker.join("db").join("airwatch.db"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = SledStorage::open(&path).unwrap();
            store.insert_reading(&reading_at(Utc::now(), 140)).await.unwrap();
            store.close().await.unwrap();
        }
        let store = SledStorage::open(&path).unwrap();
        let latest = store.latest_reading("station_01").await.unwrap().unwrap();
        assert_eq!(latest.air_value, 140);
    }
}
