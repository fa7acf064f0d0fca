//! Config Validation Tests
//!
//! Typo detection on unknown keys and range validation of a parsed
//! `StationConfig`, exercised independently from the rest of the server.

use airwatch::config::validation::{known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys};
use airwatch::config::{ConfigError, StationConfig};
use airwatch::forecast::Feature;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_prediction_section_warns_with_suggestion() {
    let toml_str = r#"
[prediction]
intervall_minutes = 15
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("intervall_minutes"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("prediction.interval_minutes"));
}

#[test]
fn typo_in_station_section_warns() {
    let warnings = validate_unknown_keys("[station]\nidd = \"x\"\n");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("station.id"));
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely.unrelated.thing", &known).is_none());
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[station]
id = "station_02"

[mqtt]
broker = "localhost"
port = 1884
topic = "lab/air"

[prediction]
interval_minutes = 10
alert_threshold_aqi = 120

[forecast]
window = 12
features = ["temperature", "air_value"]

[alerts]
timeout_secs = 3
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());

    let cfg = StationConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(cfg.station.id, "station_02");
    assert_eq!(cfg.mqtt.port, 1884);
    assert_eq!(cfg.forecast.window, 12);
    assert_eq!(cfg.forecast.features, vec![Feature::Temperature, Feature::AirValue]);
    // Untouched sections keep their defaults
    assert_eq!(cfg.server.addr, "0.0.0.0:8000");
    assert_eq!(cfg.prediction.history_hours, 12);
}

#[test]
fn empty_document_is_all_defaults() {
    let cfg = StationConfig::from_toml_str("").unwrap();
    assert_eq!(cfg.station.id, "station_01");
    assert_eq!(cfg.mqtt.broker, "broker.hivemq.com");
    assert_eq!(cfg.mqtt.topic, "home/trungvu/airquality");
    assert_eq!(cfg.prediction.interval_minutes, 30);
    assert_eq!(cfg.prediction.alert_threshold_aqi, 150);
    assert_eq!(cfg.forecast.window, 24);
    assert_eq!(cfg.forecast.features, Feature::DEFAULT_SET.to_vec());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn default_config_is_valid() {
    assert!(validate_ranges(&StationConfig::default()).is_empty());
}

#[test]
fn zero_interval_and_short_window_are_rejected() {
    let mut cfg = StationConfig::default();
    cfg.prediction.interval_minutes = 0;
    cfg.forecast.window = 1;
    let errors = validate_ranges(&cfg);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("interval_minutes")));
    assert!(errors.iter().any(|e| e.contains("forecast.window")));
}

#[test]
fn threshold_above_aqi_scale_is_rejected() {
    let mut cfg = StationConfig::default();
    cfg.prediction.alert_threshold_aqi = 501;
    assert!(validate_ranges(&cfg).iter().any(|e| e.contains("alert_threshold_aqi")));
}

#[test]
fn duplicate_or_empty_features_are_rejected() {
    let mut cfg = StationConfig::default();
    cfg.forecast.features = vec![Feature::Humidity, Feature::Humidity];
    assert!(validate_ranges(&cfg).iter().any(|e| e.contains("more than once")));

    cfg.forecast.features.clear();
    assert!(validate_ranges(&cfg).iter().any(|e| e.contains("at least one feature")));
}

#[test]
fn unknown_feature_name_fails_to_parse() {
    let err = StationConfig::from_toml_str("[forecast]\nfeatures = [\"pm10\"]\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

#[test]
fn zero_buffers_and_tick_are_rejected() {
    let toml_str = r#"
[simulation]
tick_secs = 0

[broadcast]
subscriber_buffer = 0

[mqtt]
channel_capacity = 0
"#;
    let Err(ConfigError::Validation(errors)) = StationConfig::from_toml_str(toml_str) else {
        panic!("expected validation failure");
    };
    assert_eq!(errors.len(), 3, "{errors:?}");
}

#[test]
fn bad_server_addr_is_rejected() {
    let mut cfg = StationConfig::default();
    cfg.server.addr = "not-an-address".into();
    assert!(validate_ranges(&cfg).iter().any(|e| e.contains("server.addr")));
}

// ============================================================================
// Environment overrides
// ============================================================================

#[test]
fn env_overrides_fill_secrets_and_ignore_empty_values() {
    let mut cfg = StationConfig::default();
    cfg.apply_env_overrides(|key| match key {
        "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
        "TELEGRAM_CHAT_ID" => Some(String::new()),
        "AIRWATCH_SERVER_ADDR" => Some("127.0.0.1:9000".to_string()),
        _ => None,
    });
    assert_eq!(cfg.alerts.telegram_bot_token.as_deref(), Some("123:abc"));
    assert!(cfg.alerts.telegram_chat_id.is_none());
    assert_eq!(cfg.server.addr, "127.0.0.1:9000");
}

#[test]
fn config_roundtrips_through_toml() {
    let mut cfg = StationConfig::default();
    cfg.station.id = "roof".into();
    let text = cfg.to_toml().unwrap();
    let parsed = StationConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.station.id, "roof");
    assert!(validate_unknown_keys(&text).is_empty());
}
