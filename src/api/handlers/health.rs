//! Root and health endpoints

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::pipeline::BridgeStats;

/// GET / - API information
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Air Quality Monitoring API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "websocket": "/ws",
            "latest_data": "/data/latest?station_id=station_01",
            "history": "/data/history?station_id=station_01&hours=24",
            "predict": "/predict/next_hour?station_id=station_01",
            "simulation": "/simulation/status",
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub storage: &'static str,
    pub mqtt: &'static str,
    pub subscribers: usize,
    pub simulation_active: bool,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion: Option<BridgeStats>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        storage: state.storage.backend_name(),
        mqtt: if state.bridge.is_some() { "active" } else { "disabled" },
        subscribers: state.hub.subscriber_count(),
        simulation_active: state.simulation.is_active(),
        model_loaded: state.forecast.has_model(),
        ingestion: state.bridge.as_ref().map(|b| b.stats()),
    })
}
