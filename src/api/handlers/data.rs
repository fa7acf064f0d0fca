//! Stored sensor data endpoints

use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::json;
use statrs::statistics::Statistics;

use super::{default_station, StationQuery};
use crate::api::envelope::{success_with, ApiError, ApiResponse};
use crate::api::AppState;
use crate::config::defaults;
use crate::types::SensorReading;

const DEFAULT_HISTORY_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_station")]
    pub station_id: String,
    pub hours: Option<i64>,
}

/// Validate `?hours=` against `1..=MAX_HISTORY_QUERY_HOURS`.
fn history_hours(hours: Option<i64>) -> Result<u32, ApiError> {
    let hours = hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    let max = defaults::MAX_HISTORY_QUERY_HOURS;
    u32::try_from(hours)
        .ok()
        .filter(|h| (1..=max).contains(h))
        .ok_or_else(|| ApiError::unprocessable(format!("hours must be between 1 and {max}, got {hours}")))
}

/// GET /data/latest
pub async fn latest_data(
    State(state): State<AppState>,
    Query(q): Query<StationQuery>,
) -> Result<Response, ApiError> {
    match state.storage.latest_reading(&q.station_id).await? {
        Some(reading) => Ok(ApiResponse::ok(reading)),
        None => Err(ApiError::not_found(format!("No data found for station {}", q.station_id))),
    }
}

/// GET /data/history - newest first
pub async fn data_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let hours = history_hours(q.hours)?;
    let readings = state.storage.history(&q.station_id, hours).await?;

    if readings.is_empty() {
        return Ok(success_with(
            Vec::<SensorReading>::new(),
            json!({
                "count": 0,
                "message": format!("No historical data found for station {}", q.station_id),
            }),
        ));
    }

    let count = readings.len();
    Ok(success_with(
        readings,
        json!({ "count": count, "station_id": q.station_id, "hours": hours }),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl FieldStats {
    /// `None` for an empty series.
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.collect();
        if values.is_empty() {
            return None;
        }
        Some(FieldStats {
            min: Statistics::min(&values),
            max: Statistics::max(&values),
            avg: Statistics::mean(&values),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DataStats {
    pub station_id: String,
    pub period_hours: u32,
    pub total_readings: usize,
    pub temperature: FieldStats,
    pub humidity: FieldStats,
    pub air_value: FieldStats,
    pub dust_density: FieldStats,
    pub aqi: FieldStats,
}

/// Summary statistics over a non-empty set of readings.
pub fn summarize(station_id: &str, hours: u32, readings: &[SensorReading]) -> Option<DataStats> {
    Some(DataStats {
        station_id: station_id.to_string(),
        period_hours: hours,
        total_readings: readings.len(),
        temperature: FieldStats::of(readings.iter().map(|r| r.temperature))?,
        humidity: FieldStats::of(readings.iter().map(|r| r.humidity))?,
        air_value: FieldStats::of(readings.iter().map(|r| r.air_value as f64))?,
        dust_density: FieldStats::of(readings.iter().map(|r| r.dust_density))?,
        aqi: FieldStats::of(readings.iter().map(|r| f64::from(r.aqi)))?,
    })
}

/// GET /data/stats
pub async fn data_stats(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let hours = history_hours(q.hours)?;
    let readings = state.storage.history(&q.station_id, hours).await?;
    summarize(&q.station_id, hours, &readings)
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found(format!("No data found for station {}", q.station_id)))
}
