//! Scenario parameter table and synthetic reading generation

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::types::{Scenario, SensorReading};

/// Values used when a scenario leaves a quantity at its base level.
pub const BASE_TEMPERATURE: f64 = 25.0;
pub const BASE_HUMIDITY: f64 = 60.0;
pub const BASE_DUST_DENSITY: f64 = 15.0;
pub const BASE_AIR_VALUE: f64 = 100.0;

/// Jitter applied to non-normal scenarios after the base draw.
const TEMPERATURE_JITTER: f64 = 1.0;
const HUMIDITY_JITTER: f64 = 2.0;

/// Uniform draw bounds for each quantity; `None` keeps the base value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioProfile {
    pub temperature: Option<(f64, f64)>,
    pub humidity: Option<(f64, f64)>,
    pub dust_density: Option<(f64, f64)>,
    pub air_value: Option<(f64, f64)>,
    pub gas_detected: bool,
}

impl ScenarioProfile {
    pub fn for_scenario(scenario: Scenario) -> Self {
        let base = Self {
            temperature: None,
            humidity: None,
            dust_density: None,
            air_value: None,
            gas_detected: false,
        };
        match scenario {
            Scenario::Normal => Self {
                temperature: Some((25.0, 30.0)),
                humidity: Some((50.0, 60.0)),
                dust_density: Some((10.0, 30.0)),
                air_value: Some((50.0, 150.0)),
                ..base
            },
            Scenario::Hot => Self {
                temperature: Some((35.0, 40.0)),
                humidity: Some((30.0, 40.0)),
                ..base
            },
            Scenario::Cold => Self {
                temperature: Some((10.0, 15.0)),
                humidity: Some((70.0, 80.0)),
                ..base
            },
            Scenario::Fire => Self {
                temperature: Some((45.0, 60.0)),
                dust_density: Some((100.0, 300.0)),
                air_value: Some((500.0, 800.0)),
                gas_detected: true,
                ..base
            },
            Scenario::Polluted => Self {
                dust_density: Some((150.0, 300.0)),
                air_value: Some((300.0, 500.0)),
                ..base
            },
            Scenario::Raining => Self {
                temperature: Some((20.0, 24.0)),
                humidity: Some((90.0, 99.0)),
                ..base
            },
        }
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, bounds: Option<(f64, f64)>, base: f64) -> f64 {
    match bounds {
        Some((lo, hi)) => rng.gen_range(lo..=hi),
        None => base,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Synthesize one tagged reading for `scenario`.
pub fn generate_reading<R: Rng + ?Sized>(
    rng: &mut R,
    scenario: Scenario,
    station_id: &str,
    timestamp: DateTime<Utc>,
) -> SensorReading {
    let profile = ScenarioProfile::for_scenario(scenario);

    let mut temperature = draw(rng, profile.temperature, BASE_TEMPERATURE);
    let mut humidity = draw(rng, profile.humidity, BASE_HUMIDITY);
    let dust_density = draw(rng, profile.dust_density, BASE_DUST_DENSITY);
    let air_value = draw(rng, profile.air_value, BASE_AIR_VALUE);

    if scenario != Scenario::Normal {
        temperature += rng.gen_range(-TEMPERATURE_JITTER..=TEMPERATURE_JITTER);
        humidity += rng.gen_range(-HUMIDITY_JITTER..=HUMIDITY_JITTER);
    }

    SensorReading::new(
        station_id,
        timestamp,
        round1(temperature),
        round1(humidity),
        air_value as i64,
        round1(dust_density),
    )
    .simulated(scenario)
    .with_gas_detected(profile.gas_detected)
}
