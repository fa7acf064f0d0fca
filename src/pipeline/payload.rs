//! Inbound telemetry payload decoding
//!
//! The station publishes `{temperature, humidity, airValue, dustDensity}` as
//! a JSON object. Extra fields are ignored. Numeric strings are accepted
//! because some firmware revisions quote their values.

use serde_json::Value;

pub const REQUIRED_FIELDS: [&str; 4] = ["temperature", "humidity", "airValue", "dustDensity"];

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("field '{field}' is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },
}

/// Validated station measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    pub temperature: f64,
    pub humidity: f64,
    /// Raw analog value, truncated toward zero
    pub air_value: i64,
    pub dust_density: f64,
}

/// Parse raw bytes into a JSON document.
pub fn decode(bytes: &[u8]) -> Result<Value, PayloadError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn numeric(value: &Value, field: &'static str) -> Result<f64, PayloadError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| PayloadError::NotNumeric {
            field,
            value: value.to_string(),
        })
}

impl TelemetryPayload {
    /// Check required fields on an already-decoded document.
    pub fn from_value(doc: &Value) -> Result<Self, PayloadError> {
        let obj = doc.as_object().ok_or(PayloadError::NotAnObject)?;

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !obj.contains_key(*f))
            .collect();
        if !missing.is_empty() {
            return Err(PayloadError::MissingFields(missing));
        }

        Ok(Self {
            temperature: numeric(&obj["temperature"], "temperature")?,
            humidity: numeric(&obj["humidity"], "humidity")?,
            air_value: numeric(&obj["airValue"], "airValue")?.trunc() as i64,
            dust_density: numeric(&obj["dustDensity"], "dustDensity")?,
        })
    }
}
