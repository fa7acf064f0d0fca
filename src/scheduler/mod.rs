//! Prediction Scheduler
//!
//! One long-lived loop: sleep, then fetch recent history, forecast, persist
//! the prediction and evaluate the alert threshold. The sleep is the pacing
//! mechanism, so iterations never overlap. A failed iteration is logged and
//! the loop carries on with the next sleep.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertManager;
use crate::config::StationConfig;
use crate::forecast::ForecastEngine;
use crate::storage::{StorageError, StorageGateway};
use crate::types::{ModelType, Prediction, RecordId};

/// Result of a single scheduler iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Not enough history; nothing was written.
    Skipped { readings: usize },
    Predicted {
        id: RecordId,
        aqi: u16,
        model_type: ModelType,
        alerted: bool,
    },
    /// Storage read or write failed.
    Failed,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub station_id: String,
    pub interval: Duration,
    pub history_hours: u32,
    pub min_readings: usize,
    pub alert_threshold: u16,
}

impl From<&StationConfig> for SchedulerSettings {
    fn from(cfg: &StationConfig) -> Self {
        Self {
            station_id: cfg.station.id.clone(),
            interval: Duration::from_secs(cfg.prediction.interval_minutes.saturating_mul(60)),
            history_hours: cfg.prediction.history_hours,
            min_readings: cfg.prediction.min_readings,
            alert_threshold: cfg.prediction.alert_threshold_aqi,
        }
    }
}

pub struct PredictionScheduler {
    settings: SchedulerSettings,
    storage: Arc<dyn StorageGateway>,
    forecast: Arc<ForecastEngine>,
    alerts: Arc<AlertManager>,
}

impl PredictionScheduler {
    pub fn new(
        settings: SchedulerSettings,
        storage: Arc<dyn StorageGateway>,
        forecast: Arc<ForecastEngine>,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            settings,
            storage,
            forecast,
            alerts,
        }
    }

    /// Run one prediction pass.
    pub async fn run_iteration(&self) -> IterationOutcome {
        match self.try_iteration().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "[PredictionScheduler] Iteration failed");
                IterationOutcome::Failed
            }
        }
    }

    async fn try_iteration(&self) -> Result<IterationOutcome, StorageError> {
        let s = &self.settings;
        let recent = self.storage.history(&s.station_id, s.history_hours).await?;

        if recent.len() < s.min_readings {
            warn!(
                readings = recent.len(),
                needed = s.min_readings,
                "[PredictionScheduler] Not enough data for prediction"
            );
            return Ok(IterationOutcome::Skipped { readings: recent.len() });
        }

        let forecast = self.forecast.predict(&recent);
        let prediction = Prediction::new(
            s.station_id.as_str(),
            Utc::now(),
            forecast.aqi,
            forecast.model_type,
            forecast.data_points_used,
            true,
        );
        let id = self.storage.insert_prediction(&prediction).await?;
        info!(
            aqi = forecast.aqi,
            category = %prediction.predicted_category,
            model = %forecast.model_type,
            "[PredictionScheduler] Periodic prediction stored"
        );

        let alerted = self
            .alerts
            .check_and_alert(&s.station_id, forecast.aqi, s.alert_threshold);

        Ok(IterationOutcome::Predicted {
            id,
            aqi: forecast.aqi,
            model_type: forecast.model_type,
            alerted,
        })
    }

    /// Sleep/iterate until `cancel` fires. Cancellation is only observed
    /// while sleeping, so an iteration in progress always completes.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            station_id = %self.settings.station_id,
            interval_secs = self.settings.interval.as_secs(),
            threshold = self.settings.alert_threshold,
            "[PredictionScheduler] Started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
            debug!("[PredictionScheduler] Running periodic AQI prediction");
            self.run_iteration().await;
        }
        info!("[PredictionScheduler] Stopped");
    }
}
