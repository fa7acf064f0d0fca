//! AQI predictions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aqi::{self, AqiCategory};

use super::RecordId;

/// Which path produced a forecast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Inference on a loaded window regressor.
    Trained,
    /// Moving average of recent raw air values.
    Fallback,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::Trained => write!(f, "trained"),
            ModelType::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub station_id: String,
    pub prediction_timestamp: DateTime<Utc>,
    pub predicted_aqi: u16,
    pub predicted_category: AqiCategory,
    pub model_type: ModelType,
    pub data_points_used: usize,
    pub auto_generated: bool,
}

impl Prediction {
    /// Build a prediction; the category is derived from `predicted_aqi`.
    pub fn new(
        station_id: impl Into<String>,
        prediction_timestamp: DateTime<Utc>,
        predicted_aqi: u16,
        model_type: ModelType,
        data_points_used: usize,
        auto_generated: bool,
    ) -> Self {
        Self {
            id: None,
            station_id: station_id.into(),
            prediction_timestamp,
            predicted_aqi,
            predicted_category: aqi::category(predicted_aqi),
            model_type,
            data_points_used,
            auto_generated,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }
}
