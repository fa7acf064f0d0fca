//! REST + WebSocket API using Axum
//!
//! - `/ws` live sensor updates from the Broadcast Hub
//! - `/data/*` stored readings, `/predict/*` forecasts and training
//! - `/simulation/*` synthetic data control, `/health`

pub mod envelope;
pub mod handlers;
mod routes;
pub mod ws;

use axum::http::{header, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::alerts::AlertManager;
use crate::broadcast::BroadcastHub;
use crate::config::StationConfig;
use crate::forecast::ForecastEngine;
use crate::pipeline::TelemetryBridge;
use crate::simulation::SimulationEngine;
use crate::storage::StorageGateway;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StationConfig>,
    pub storage: Arc<dyn StorageGateway>,
    pub hub: Arc<BroadcastHub>,
    pub simulation: Arc<SimulationEngine>,
    pub forecast: Arc<ForecastEngine>,
    pub alerts: Arc<AlertManager>,
    /// Absent when the MQTT bridge is disabled
    pub bridge: Option<Arc<TelemetryBridge>>,
}

/// Restrict origins with `AIRWATCH_CORS_ORIGINS` (comma-separated);
/// any origin is allowed otherwise.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match std::env::var("AIRWATCH_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base.allow_origin(Any),
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    routes::api_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
