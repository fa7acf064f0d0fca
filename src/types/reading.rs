//! Sensor readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aqi::{self, AqiCategory};

use super::Scenario;

/// Opaque storage identifier, rendered as a plain string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(format!("{id:016x}"))
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation from the station.
///
/// `aqi` and `aqi_category` are always derived from `air_value` through
/// [`aqi::classify_raw_value`]; use [`SensorReading::new`] rather than building
/// the struct by hand. Simulated readings carry `is_simulated` and `scenario`,
/// real ones omit both fields when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub air_value: i64,
    pub dust_density: f64,
    pub aqi: u16,
    pub aqi_category: AqiCategory,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_detected: Option<bool>,
}

impl SensorReading {
    /// Build a real reading, deriving AQI and category from `air_value`.
    pub fn new(
        station_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        temperature: f64,
        humidity: f64,
        air_value: i64,
        dust_density: f64,
    ) -> Self {
        let (aqi, aqi_category) = aqi::classify_raw_value(air_value);
        Self {
            id: None,
            station_id: station_id.into(),
            timestamp,
            temperature,
            humidity,
            air_value,
            dust_density,
            aqi,
            aqi_category,
            is_simulated: false,
            scenario: None,
            gas_detected: None,
        }
    }

    /// Tag this reading as produced by the simulation engine.
    pub fn simulated(mut self, scenario: Scenario) -> Self {
        self.is_simulated = true;
        self.scenario = Some(scenario);
        self
    }

    pub fn with_gas_detected(mut self, detected: bool) -> Self {
        self.gas_detected = Some(detected);
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether the stored AQI fields match what the classifier would derive.
    pub fn is_consistent(&self) -> bool {
        aqi::classify_raw_value(self.air_value) == (self.aqi, self.aqi_category)
    }
}
