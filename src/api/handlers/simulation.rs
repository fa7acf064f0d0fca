//! Simulation control endpoints

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::envelope::{success_with, ApiError};
use crate::api::AppState;
use crate::simulation::SimulationStatus;
use crate::types::Scenario;

#[derive(Debug, Deserialize)]
pub struct StartSimulationRequest {
    pub scenario: String,
}

/// POST /simulation/start
pub async fn start_simulation(
    State(state): State<AppState>,
    Json(req): Json<StartSimulationRequest>,
) -> Result<Response, ApiError> {
    let scenario: Scenario = req
        .scenario
        .parse()
        .map_err(|e: crate::types::ScenarioError| ApiError::bad_request(e.to_string()))?;

    let status = state.simulation.start(scenario);
    Ok(success_with(
        status,
        json!({ "message": format!("Simulation started: {scenario}") }),
    ))
}

/// POST /simulation/stop
pub async fn stop_simulation(State(state): State<AppState>) -> Response {
    state.simulation.stop();
    success_with(state.simulation.status(), json!({ "message": "Simulation stopped" }))
}

/// GET /simulation/status - bare status object
pub async fn simulation_status(State(state): State<AppState>) -> Json<SimulationStatus> {
    Json(state.simulation.status())
}
