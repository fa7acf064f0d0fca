//! Persisted model artifact.
//!
//! A single JSON document holding the scaler statistics and regressor
//! parameters. Saved atomically (write temp file, then rename).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use super::model::WindowRegressor;
use super::normalizer::MinMaxScaler;
use super::{Feature, TrainedModel};

/// Bumped whenever the artifact layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub window: usize,
    pub features: Vec<Feature>,
    pub scaler: MinMaxScaler,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact version {found} is not supported (expected {ARTIFACT_VERSION})")]
    Version { found: u32 },
    #[error("artifact was trained for window {found}, engine uses {expected}")]
    Window { expected: usize, found: usize },
    #[error("artifact feature list {found:?} does not match {expected:?}")]
    Features { expected: Vec<Feature>, found: Vec<Feature> },
    #[error("artifact parameters are inconsistent")]
    Corrupt,
}

impl ModelArtifact {
    pub fn from_model(model: &TrainedModel) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            window: model.window,
            features: model.features.clone(),
            scaler: model.scaler.clone(),
            weights: model.regressor.weights().to_vec(),
            bias: model.regressor.bias(),
            trained_at: model.trained_at,
            samples: model.samples,
        }
    }

    /// Check the artifact against the engine's shape and rebuild the model.
    pub fn into_model(self, window: usize, features: &[Feature]) -> Result<TrainedModel, ArtifactError> {
        if self.version != ARTIFACT_VERSION {
            return Err(ArtifactError::Version { found: self.version });
        }
        if self.window != window {
            return Err(ArtifactError::Window { expected: window, found: self.window });
        }
        if self.features != features {
            return Err(ArtifactError::Features {
                expected: features.to_vec(),
                found: self.features,
            });
        }
        // Feature columns plus the AQI column
        if self.scaler.columns() != features.len() + 1 || !self.scaler.is_valid() {
            return Err(ArtifactError::Corrupt);
        }
        let regressor = WindowRegressor::from_parts(window, features.len(), self.weights, self.bias)
            .ok_or(ArtifactError::Corrupt)?;

        Ok(TrainedModel {
            window,
            features: self.features,
            scaler: self.scaler,
            regressor,
            trained_at: self.trained_at,
            samples: self.samples,
        })
    }
}

/// Write `artifact` to `path` atomically.
pub fn save_to_disk(artifact: &ModelArtifact, path: &Path) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec_pretty(artifact)?;

    // Write to temp file alongside the target
    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read an artifact; `Ok(None)` when the file does not exist.
pub fn load_from_disk(path: &Path) -> Result<Option<ModelArtifact>, ArtifactError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}
