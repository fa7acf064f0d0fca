//! Forecast Engine - next-step AQI prediction
//!
//! Two paths:
//! - **Trained**: the last `W` readings (chronological) are min-max scaled
//!   with the model's stored statistics, fed through the window regressor,
//!   and the predicted AQI column is inverse-scaled and clamped to 0-500.
//! - **Fallback**: with no model loaded, or fewer than `W` readings, the
//!   newest ten raw air values are averaged and classified. This path never
//!   fails; empty input yields 0.
//!
//! The loaded model lives in an `ArcSwapOption`. `train` and
//! `load_from_path` build a complete replacement before swapping it in, so
//! a concurrent `predict` sees either the old model or the new one.

pub mod artifact;
mod model;
mod normalizer;
pub mod training;

pub use artifact::{ArtifactError, ModelArtifact};
pub use model::WindowRegressor;
pub use normalizer::MinMaxScaler;
pub use training::{TrainingParams, TrainingReport};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aqi::{self, AQI_MAX};
use crate::config::{defaults, ForecastConfig};
use crate::types::{ModelType, SensorReading};
use training::Sample;

// ============================================================================
// Features
// ============================================================================

/// Model input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature,
    Humidity,
    AirValue,
    DustDensity,
}

impl Feature {
    pub const DEFAULT_SET: [Feature; 4] = [
        Feature::Temperature,
        Feature::Humidity,
        Feature::AirValue,
        Feature::DustDensity,
    ];

    pub fn extract(self, reading: &SensorReading) -> f64 {
        match self {
            Feature::Temperature => reading.temperature,
            Feature::Humidity => reading.humidity,
            Feature::AirValue => reading.air_value as f64,
            Feature::DustDensity => reading.dust_density,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::AirValue => "air_value",
            Feature::DustDensity => "dust_density",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Errors / results
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("not enough data: need at least {needed} readings, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("training diverged at epoch {epoch}")]
    Diverged { epoch: usize },
    #[error("training samples do not match the model shape")]
    ShapeMismatch,
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// One forecast and the path that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub aqi: u16,
    pub model_type: ModelType,
    pub data_points_used: usize,
}

/// Fitted scaler and regressor. Immutable once built.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub window: usize,
    pub features: Vec<Feature>,
    pub scaler: MinMaxScaler,
    pub regressor: WindowRegressor,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
}

/// Status view of the loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub window: usize,
    pub features: Vec<Feature>,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
}

// ============================================================================
// Engine
// ============================================================================

pub struct ForecastEngine {
    window: usize,
    features: Vec<Feature>,
    params: TrainingParams,
    model: ArcSwapOption<TrainedModel>,
}

impl ForecastEngine {
    pub fn new(window: usize, features: Vec<Feature>) -> Self {
        Self {
            window: window.max(1),
            features,
            params: TrainingParams::default(),
            model: ArcSwapOption::empty(),
        }
    }

    pub fn from_config(cfg: &ForecastConfig) -> Self {
        Self {
            params: TrainingParams::from(cfg),
            ..Self::new(cfg.window, cfg.features.clone())
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn training_params(&self) -> TrainingParams {
        self.params
    }

    /// Whether a trained model is currently loaded.
    pub fn has_model(&self) -> bool {
        self.model.load().is_some()
    }

    pub fn model_type(&self) -> ModelType {
        if self.has_model() {
            ModelType::Trained
        } else {
            ModelType::Fallback
        }
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.model.load_full().map(|m| ModelInfo {
            window: m.window,
            features: m.features.clone(),
            trained_at: m.trained_at,
            samples: m.samples,
        })
    }

    /// Forecast the next AQI from `readings` (any order). Never fails.
    pub fn predict(&self, readings: &[SensorReading]) -> Forecast {
        let mut ordered: Vec<&SensorReading> = readings.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        if let Some(model) = self.model.load_full() {
            if ordered.len() >= model.window {
                let recent = &ordered[ordered.len() - model.window..];
                match infer(&model, recent) {
                    Some(aqi) => {
                        return Forecast {
                            aqi,
                            model_type: ModelType::Trained,
                            data_points_used: readings.len(),
                        }
                    }
                    None => warn!("[Forecast] Model produced a non-finite value, using fallback"),
                }
            } else {
                debug!(
                    have = ordered.len(),
                    need = model.window,
                    "[Forecast] Not enough readings for model, using fallback"
                );
            }
        }

        Forecast {
            aqi: fallback_aqi(&ordered),
            model_type: ModelType::Fallback,
            data_points_used: readings.len(),
        }
    }

    /// Fit a new model on `history` and swap it in. On error the
    /// currently loaded model is left untouched.
    pub fn train(
        &self,
        history: &[SensorReading],
        params: &TrainingParams,
    ) -> Result<TrainingReport, ForecastError> {
        let needed = self.window + 1;
        if history.len() < needed {
            return Err(ForecastError::InsufficientData { needed, got: history.len() });
        }

        let mut ordered: Vec<&SensorReading> = history.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        let matrix: Vec<Vec<f64>> = ordered.iter().map(|r| self.row(r)).collect();
        let scaler = MinMaxScaler::fit(&matrix).ok_or(ForecastError::InsufficientData { needed, got: 0 })?;
        let scaled: Vec<Vec<f64>> = matrix.iter().map(|row| scaler.transform_row(row)).collect();

        let n_features = self.features.len();
        let samples: Vec<Sample> = (0..scaled.len() - self.window)
            .map(|i| Sample {
                inputs: scaled[i..i + self.window]
                    .iter()
                    .flat_map(|row| row[..n_features].iter().copied())
                    .collect(),
                target: scaled[i + self.window][n_features],
            })
            .collect();

        info!(
            readings = history.len(),
            samples = samples.len(),
            epochs = params.epochs,
            "[Forecast] Training window regressor"
        );
        let (regressor, report) = training::fit(&samples, self.window, n_features, params)?;

        self.model.store(Some(Arc::new(TrainedModel {
            window: self.window,
            features: self.features.clone(),
            scaler,
            regressor,
            trained_at: Utc::now(),
            samples: samples.len(),
        })));
        info!(
            train_loss = report.final_train_loss,
            validation_loss = ?report.final_validation_loss,
            "[Forecast] Model trained and loaded"
        );
        Ok(report)
    }

    /// Load a persisted artifact. `Ok(false)` means there was no file; an
    /// invalid artifact is an error and leaves the current model in place.
    pub fn load_from_path(&self, path: &Path) -> Result<bool, ForecastError> {
        let Some(artifact) = artifact::load_from_disk(path)? else {
            info!(path = %path.display(), "[Forecast] No model artifact, using fallback forecasts");
            return Ok(false);
        };
        let model = artifact.into_model(self.window, &self.features)?;
        info!(
            path = %path.display(),
            trained_at = %model.trained_at,
            samples = model.samples,
            "[Forecast] Model loaded"
        );
        self.model.store(Some(Arc::new(model)));
        Ok(true)
    }

    /// Persist the loaded model. Returns false when there is nothing to save.
    pub fn save_to_path(&self, path: &Path) -> Result<bool, ForecastError> {
        let Some(model) = self.model.load_full() else {
            return Ok(false);
        };
        artifact::save_to_disk(&ModelArtifact::from_model(&model), path)?;
        info!(path = %path.display(), "[Forecast] Model artifact saved");
        Ok(true)
    }

    /// Feature columns followed by the derived AQI column.
    fn row(&self, reading: &SensorReading) -> Vec<f64> {
        self.features
            .iter()
            .map(|f| f.extract(reading))
            .chain(std::iter::once(f64::from(aqi::aqi_from_raw_value(reading.air_value))))
            .collect()
    }
}

fn infer(model: &TrainedModel, recent: &[&SensorReading]) -> Option<u16> {
    let n_features = model.features.len();
    let inputs: Vec<f64> = recent
        .iter()
        .flat_map(|r| {
            model
                .features
                .iter()
                .enumerate()
                .map(move |(c, f)| model.scaler.transform_value(c, f.extract(r)))
        })
        .collect();

    let scaled = model.regressor.predict(&inputs);
    let predicted = model.scaler.inverse_value(n_features, scaled);
    predicted
        .is_finite()
        .then(|| predicted.clamp(0.0, f64::from(AQI_MAX)) as u16)
}

/// Mean of the newest raw air values, rounded, then classified.
/// `ordered` must be chronological.
pub fn fallback_aqi(ordered: &[&SensorReading]) -> u16 {
    if ordered.is_empty() {
        return 0;
    }
    let take = ordered.len().min(defaults::FALLBACK_AVERAGE_WINDOW);
    let values: Vec<f64> = ordered[ordered.len() - take..]
        .iter()
        .map(|r| r.air_value as f64)
        .collect();
    let mean = values.iter().mean();
    aqi::aqi_from_raw_value(mean.round() as i64)
}
