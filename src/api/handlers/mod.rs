//! API route handlers
//!
//! - `health`: root info and liveness
//! - `simulation`: start/stop/status of synthetic mode
//! - `data`: stored readings
//! - `predict`: on-demand forecasts, training and model status

mod data;
mod health;
mod predict;
mod simulation;

pub use data::*;
pub use health::*;
pub use predict::*;
pub use simulation::*;

use serde::Deserialize;

use crate::config::defaults;

/// `?station_id=` selector shared by most endpoints.
#[derive(Debug, Deserialize)]
pub struct StationQuery {
    #[serde(default = "default_station")]
    pub station_id: String,
}

fn default_station() -> String {
    defaults::DEFAULT_STATION_ID.to_string()
}
