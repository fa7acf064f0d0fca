//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::{handlers, ws, AppState};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ws", get(ws::ws_handler))
        // Simulation control
        .route("/simulation/start", post(handlers::start_simulation))
        .route("/simulation/stop", post(handlers::stop_simulation))
        .route("/simulation/status", get(handlers::simulation_status))
        // Stored readings
        .route("/data/latest", get(handlers::latest_data))
        .route("/data/history", get(handlers::data_history))
        .route("/data/stats", get(handlers::data_stats))
        // Forecasting
        .route("/predict/next_hour", get(handlers::predict_next_hour))
        .route("/predict/latest", get(handlers::latest_prediction))
        .route("/predict/status", get(handlers::prediction_status))
        .route("/predict/train", post(handlers::train_model))
        .with_state(state)
}
