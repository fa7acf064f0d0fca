//! Shared data structures for the air quality pipeline
//!
//! - SensorReading: one observation from the station (real or simulated)
//! - Prediction: one AQI forecast produced by the scheduler or on demand
//! - Scenario: the closed set of synthetic data profiles

mod reading;
mod prediction;
mod scenario;

pub use reading::*;
pub use prediction::*;
pub use scenario::*;
