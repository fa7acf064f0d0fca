//! Prediction scheduler integration tests
//!
//! Builds the full service graph over in-memory storage with a recording
//! notifier, then drives scheduler iterations directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use airwatch::alerts::Notifier;
use airwatch::forecast::{Feature, TrainingParams};
use airwatch::scheduler::{IterationOutcome, SchedulerSettings};
use airwatch::{
    AlertManager, ForecastEngine, InMemoryStorage, ModelType, Prediction, PredictionScheduler, RecordId,
    SensorReading, Services, StationConfig, StorageError, StorageGateway,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        !self.fail
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn services(notifier: Arc<RecordingNotifier>) -> Services {
    let mut config = StationConfig::default();
    config.forecast.window = 6;
    config.forecast.epochs = 5;
    Services::build(config, Arc::new(InMemoryStorage::new()), notifier)
}

/// Fails the first `failures` history reads, then delegates.
struct FlakyStorage {
    inner: InMemoryStorage,
    failures: AtomicUsize,
}

#[async_trait]
impl StorageGateway for FlakyStorage {
    async fn insert_reading(&self, reading: &SensorReading) -> Result<RecordId, StorageError> {
        self.inner.insert_reading(reading).await
    }

    async fn latest_reading(&self, station_id: &str) -> Result<Option<SensorReading>, StorageError> {
        self.inner.latest_reading(station_id).await
    }

    async fn readings_since(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StorageError> {
        let failing = self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Closed);
        }
        self.inner.readings_since(station_id, since).await
    }

    async fn insert_prediction(&self, prediction: &Prediction) -> Result<RecordId, StorageError> {
        self.inner.insert_prediction(prediction).await
    }

    async fn latest_prediction(&self, station_id: &str) -> Result<Option<Prediction>, StorageError> {
        self.inner.latest_prediction(station_id).await
    }

    fn backend_name(&self) -> &'static str {
        "Flaky"
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.inner.close().await
    }
}

async fn seed(storage: &dyn StorageGateway, air_values: &[i64]) {
    let start = Utc::now() - Duration::hours(6);
    for (i, &air) in air_values.iter().enumerate() {
        let reading = SensorReading::new(
            "station_01",
            start + Duration::minutes(5 * i as i64),
            22.0 + (i % 4) as f64,
            55.0 + (i % 6) as f64,
            air,
            8.0 + (i % 3) as f64,
        );
        storage.insert_reading(&reading).await.unwrap();
    }
}

#[tokio::test]
async fn fallback_prediction_is_stored_as_auto_generated() {
    let notifier = Arc::new(RecordingNotifier::default());
    let s = services(notifier.clone());
    seed(s.storage.as_ref(), &[240; 20]).await;

    let outcome = s.scheduler.run_iteration().await;
    assert!(
        matches!(outcome, IterationOutcome::Predicted { aqi: 120, model_type: ModelType::Fallback, alerted: false, .. }),
        "{outcome:?}"
    );

    let stored = s.storage.latest_prediction("station_01").await.unwrap().unwrap();
    assert!(stored.auto_generated);
    assert_eq!(stored.predicted_aqi, 120);
    assert_eq!(stored.data_points_used, 20);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn trained_model_drives_periodic_predictions() {
    let notifier = Arc::new(RecordingNotifier::default());
    let s = services(notifier);
    seed(s.storage.as_ref(), &[200; 40]).await;

    let history = s.storage.training_data("station_01", 24).await.unwrap();
    let params = TrainingParams { epochs: 5, ..TrainingParams::default() };
    let report = s.forecast.train(&history, &params).unwrap();
    assert_eq!(report.samples, 34);

    let outcome = s.scheduler.run_iteration().await;
    assert!(
        matches!(outcome, IterationOutcome::Predicted { aqi: 100, model_type: ModelType::Trained, .. }),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn trained_model_survives_restart_through_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let mut config = StationConfig::default();
    config.forecast.window = 6;
    config.forecast.model_path = dir.path().join("forecast_model.json");
    let first = Services::build(config.clone(), Arc::new(InMemoryStorage::new()), notifier.clone());
    assert!(!first.load_model());

    seed(first.storage.as_ref(), &[200; 40]).await;
    let history = first.storage.training_data("station_01", 24).await.unwrap();
    first
        .forecast
        .train(&history, &TrainingParams { epochs: 5, ..TrainingParams::default() })
        .unwrap();
    assert!(first.forecast.save_to_path(&config.forecast.model_path).unwrap());

    let second = Services::build(config, Arc::new(InMemoryStorage::new()), notifier);
    assert!(second.load_model());
    assert_eq!(second.forecast.model_type(), ModelType::Trained);
}

#[tokio::test]
async fn high_forecast_dispatches_alert_text() {
    let notifier = Arc::new(RecordingNotifier::default());
    let s = services(notifier.clone());
    seed(s.storage.as_ref(), &[450; 12]).await;

    let outcome = s.scheduler.run_iteration().await;
    assert!(matches!(outcome, IterationOutcome::Predicted { aqi: 250, alerted: true, .. }));
    s.alerts.wait_idle().await;

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Station: station_01"));
    assert!(sent[0].contains("Predicted AQI: 250"));
    assert!(sent[0].contains("Threshold: 150"));
    assert!(sent[0].contains("Very Unhealthy"));
}

#[tokio::test]
async fn failed_delivery_does_not_fail_the_iteration() {
    let notifier = Arc::new(RecordingNotifier { fail: true, ..RecordingNotifier::default() });
    let s = services(notifier.clone());
    seed(s.storage.as_ref(), &[450; 12]).await;

    let outcome = s.scheduler.run_iteration().await;
    assert!(matches!(outcome, IterationOutcome::Predicted { alerted: true, .. }));
    s.alerts.wait_idle().await;
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);

    // Prediction is persisted regardless of alert delivery
    assert!(s.storage.latest_prediction("station_01").await.unwrap().is_some());
}

#[tokio::test]
async fn threshold_is_exclusive() {
    let notifier = Arc::new(RecordingNotifier::default());
    let s = services(notifier.clone());
    // 300 -> AQI 150, exactly the default threshold
    seed(s.storage.as_ref(), &[300; 12]).await;

    let outcome = s.scheduler.run_iteration().await;
    assert!(matches!(outcome, IterationOutcome::Predicted { aqi: 150, alerted: false, .. }));
    s.alerts.wait_idle().await;
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn loop_keeps_running_after_a_failed_iteration() {
    let storage = Arc::new(FlakyStorage {
        inner: InMemoryStorage::new(),
        failures: AtomicUsize::new(1),
    });
    seed(&storage.inner, &[200; 12]).await;

    let settings = SchedulerSettings {
        station_id: "station_01".into(),
        interval: std::time::Duration::from_secs(60),
        history_hours: 12,
        min_readings: 10,
        alert_threshold: 150,
    };
    let scheduler = Arc::new(PredictionScheduler::new(
        settings,
        storage.clone(),
        Arc::new(ForecastEngine::new(6, Feature::DEFAULT_SET.to_vec())),
        Arc::new(AlertManager::new(Arc::new(RecordingNotifier::default()))),
    ));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    // First tick hits the failing read
    tokio::time::sleep(std::time::Duration::from_secs(70)).await;
    assert_eq!(storage.failures.load(Ordering::Acquire), 0);
    assert_eq!(storage.inner.prediction_count(), 0);

    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(storage.inner.prediction_count(), 1);
    let stored = storage.latest_prediction("station_01").await.unwrap().unwrap();
    assert!(stored.auto_generated);
    assert_eq!(stored.predicted_aqi, 100);

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(1), task)
        .await
        .expect("scheduler loop did not stop")
        .unwrap();
}
