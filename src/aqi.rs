//! AQI Classifier
//!
//! Pure mappings from sensor values to an Air Quality Index score and its
//! category label. Every persisted reading and prediction derives its AQI
//! fields through these functions alone, so the values are reproducible
//! from the record's own numbers.
//!
//! Two scales are supported:
//! - `aqi_from_pm25`: EPA piecewise-linear interpolation over PM2.5 breakpoints
//! - `aqi_from_raw_value`: the raw analog gas sensor mapping used by ingestion

use serde::{Deserialize, Serialize};

/// Highest representable AQI.
pub const AQI_MAX: u16 = 500;

/// EPA PM2.5 breakpoints: (concentration low, concentration high, index low, index high).
const PM25_BREAKPOINTS: [(f64, f64, f64, f64); 6] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 500.4, 301.0, 500.0),
];

/// AQI category band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    /// Human-readable label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Calculate the AQI for a PM2.5 concentration (µg/m³).
///
/// Concentrations inside a breakpoint band are linearly interpolated and
/// truncated. Values in the gaps between bands (e.g. 12.05) and negative
/// values fall through to the next band that contains them; anything above
/// 500.4 clamps to 500.
pub fn aqi_from_pm25(pm25: f64) -> u16 {
    if !pm25.is_finite() {
        return if pm25 == f64::NEG_INFINITY { 0 } else { AQI_MAX };
    }
    if pm25 <= 0.0 {
        return 0;
    }

    for &(c_low, c_high, i_low, i_high) in &PM25_BREAKPOINTS {
        if pm25 <= c_high {
            if pm25 == c_high {
                return i_high as u16;
            }
            // Gap values (between c_high of one band and c_low of the next)
            // are treated as the bottom of the next band.
            let c = pm25.max(c_low);
            let aqi = (i_high - i_low) / (c_high - c_low) * (c - c_low) + i_low;
            return aqi as u16;
        }
    }

    AQI_MAX
}

/// Convert a raw analog air-quality sensor value to AQI.
///
/// Piecewise mapping, truncated to an integer and clamped to 500:
///
/// | raw value   | AQI                         |
/// |-------------|-----------------------------|
/// | < 100       | 0.5 v                       |
/// | 100 - 199   | 50 + 0.5 (v - 100)          |
/// | 200 - 299   | 100 + 0.5 (v - 200)         |
/// | 300 - 399   | 150 + 0.5 (v - 300)         |
/// | 400 - 499   | 200 + (v - 400)             |
/// | >= 500      | min(500, 300 + 0.4 (v - 500)) |
pub fn aqi_from_raw_value(value: i64) -> u16 {
    let v = value as f64;
    let aqi = match value {
        i64::MIN..=99 => v * 0.5,
        100..=199 => 50.0 + (v - 100.0) * 0.5,
        200..=299 => 100.0 + (v - 200.0) * 0.5,
        300..=399 => 150.0 + (v - 300.0) * 0.5,
        400..=499 => 200.0 + (v - 400.0),
        _ => (300.0 + (v - 500.0) * 0.4).min(f64::from(AQI_MAX)),
    };
    // Negative raw values are sensor faults; floor at zero.
    aqi.max(0.0) as u16
}

/// Map an AQI score to its category band.
pub fn category(aqi: u16) -> AqiCategory {
    match aqi {
        0..=50 => AqiCategory::Good,
        51..=100 => AqiCategory::Moderate,
        101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
        151..=200 => AqiCategory::Unhealthy,
        201..=300 => AqiCategory::VeryUnhealthy,
        _ => AqiCategory::Hazardous,
    }
}

/// Convenience: raw sensor value straight to `(aqi, category)`.
pub fn classify_raw_value(value: i64) -> (u16, AqiCategory) {
    let aqi = aqi_from_raw_value(value);
    (aqi, category(aqi))
}
