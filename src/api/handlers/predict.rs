//! Forecast endpoints: on-demand prediction, training, model status

use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{default_station, StationQuery};
use crate::api::envelope::{success_with, ApiError, ApiResponse};
use crate::api::AppState;
use crate::config::defaults;
use crate::forecast::ForecastError;
use crate::types::Prediction;

/// GET /predict/next_hour
pub async fn predict_next_hour(
    State(state): State<AppState>,
    Query(q): Query<StationQuery>,
) -> Result<Response, ApiError> {
    let cfg = &state.config.prediction;
    let recent = state.storage.history(&q.station_id, cfg.history_hours).await?;

    let needed = defaults::MIN_READINGS_ON_DEMAND;
    if recent.len() < needed {
        return Err(ApiError::bad_request(format!(
            "Not enough historical data for prediction (need at least {needed} readings, got {})",
            recent.len()
        )));
    }

    let forecast = state.forecast.predict(&recent);
    let prediction = Prediction::new(
        q.station_id.as_str(),
        Utc::now(),
        forecast.aqi,
        forecast.model_type,
        forecast.data_points_used,
        false,
    );
    state.storage.insert_prediction(&prediction).await?;

    let threshold = cfg.alert_threshold_aqi;
    state.alerts.check_and_alert(&q.station_id, forecast.aqi, threshold);

    Ok(ApiResponse::ok(json!({
        "station_id": prediction.station_id,
        "prediction_timestamp": prediction.prediction_timestamp,
        "predicted_aqi": prediction.predicted_aqi,
        "predicted_category": prediction.predicted_category,
        "model_type": prediction.model_type,
        "data_points_used": prediction.data_points_used,
        "alert_threshold": threshold,
        "is_alert": forecast.aqi > threshold,
    })))
}

/// GET /predict/latest
pub async fn latest_prediction(
    State(state): State<AppState>,
    Query(q): Query<StationQuery>,
) -> Result<Response, ApiError> {
    match state.storage.latest_prediction(&q.station_id).await? {
        Some(p) => Ok(ApiResponse::ok(p)),
        None => Err(ApiError::not_found(format!("No predictions found for station {}", q.station_id))),
    }
}

/// GET /predict/status
pub async fn prediction_status(State(state): State<AppState>) -> Response {
    let cfg = &state.config.prediction;
    ApiResponse::ok(json!({
        "model_loaded": state.forecast.has_model(),
        "model_type": state.forecast.model_type(),
        "model": state.forecast.model_info(),
        "window": state.forecast.window(),
        "prediction_interval_minutes": cfg.interval_minutes,
        "alert_threshold_aqi": cfg.alert_threshold_aqi,
        "telegram_configured": state.alerts.is_configured(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    #[serde(default = "default_station")]
    pub station_id: String,
    pub hours: Option<i64>,
}

/// POST /predict/train
pub async fn train_model(
    State(state): State<AppState>,
    Query(q): Query<TrainQuery>,
) -> Result<Response, ApiError> {
    let (min, max) = (defaults::MIN_TRAINING_QUERY_HOURS, defaults::MAX_TRAINING_QUERY_HOURS);
    let requested = q.hours.unwrap_or(i64::from(state.config.prediction.training_hours));
    let hours = u32::try_from(requested)
        .ok()
        .filter(|h| (min..=max).contains(h))
        .ok_or_else(|| ApiError::unprocessable(format!("hours must be between {min} and {max}, got {requested}")))?;

    let data = state.storage.training_data(&q.station_id, hours).await?;
    let needed = defaults::MIN_READINGS_FOR_TRAINING;
    if data.len() < needed {
        return Err(ApiError::bad_request(format!(
            "Not enough data for training (need at least {needed} readings, got {})",
            data.len()
        )));
    }

    let data_points = data.len();
    info!(station_id = %q.station_id, data_points, hours, "Training forecast model");

    let engine = Arc::clone(&state.forecast);
    let params = engine.training_params();
    let report = tokio::task::spawn_blocking(move || engine.train(&data, &params))
        .await
        .map_err(|e| ApiError::internal(format!("Training task failed: {e}")))?
        .map_err(|e| match e {
            ForecastError::InsufficientData { .. } => ApiError::bad_request(e.to_string()),
            other => {
                error!(error = %other, "Model training failed");
                ApiError::internal(format!("Model training failed: {other}"))
            }
        })?;

    let model_path = &state.config.forecast.model_path;
    let model_saved = match state.forecast.save_to_path(model_path) {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, path = %model_path.display(), "Model trained but artifact not saved");
            false
        }
    };

    Ok(success_with(
        report,
        json!({
            "message": "Model trained successfully",
            "data_points": data_points,
            "hours_used": hours,
            "model_saved": model_saved,
        }),
    ))
}
