//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Typos only warn; out-of-range values are errors.

use std::collections::HashSet;

use super::StationConfig;
use crate::aqi::AQI_MAX;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `StationConfig`.
///
/// Kept in step with station_config.rs by hand.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [station]
        "station",
        "station.id",
        // [mqtt]
        "mqtt",
        "mqtt.enabled",
        "mqtt.broker",
        "mqtt.port",
        "mqtt.topic",
        "mqtt.client_id",
        "mqtt.keep_alive_secs",
        "mqtt.channel_capacity",
        // [prediction]
        "prediction",
        "prediction.interval_minutes",
        "prediction.history_hours",
        "prediction.min_readings",
        "prediction.alert_threshold_aqi",
        "prediction.training_hours",
        // [forecast]
        "forecast",
        "forecast.window",
        "forecast.features",
        "forecast.model_path",
        "forecast.epochs",
        "forecast.batch_size",
        "forecast.learning_rate",
        "forecast.validation_split",
        // [simulation]
        "simulation",
        "simulation.tick_secs",
        "simulation.persist_readings",
        // [broadcast]
        "broadcast",
        "broadcast.subscriber_buffer",
        // [storage]
        "storage",
        "storage.path",
        // [server]
        "server",
        "server.addr",
        // [alerts]
        "alerts",
        "alerts.telegram_bot_token",
        "alerts.telegram_chat_id",
        "alerts.timeout_secs",
    ];
    keys.iter().copied().collect()
}

/// Recursively collect dotted key paths from a TOML value.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Collect every impossible value in `config`. An empty result means valid.
pub fn validate_ranges(config: &StationConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.station.id.trim().is_empty() {
        errors.push("station.id must not be empty".to_string());
    }

    let m = &config.mqtt;
    if m.topic.trim().is_empty() {
        errors.push("mqtt.topic must not be empty".to_string());
    }
    if m.channel_capacity == 0 {
        errors.push("mqtt.channel_capacity must be > 0".to_string());
    }

    let p = &config.prediction;
    if p.interval_minutes == 0 {
        errors.push("prediction.interval_minutes must be > 0".to_string());
    }
    if p.history_hours == 0 {
        errors.push("prediction.history_hours must be > 0".to_string());
    }
    if p.alert_threshold_aqi > AQI_MAX {
        errors.push(format!(
            "prediction.alert_threshold_aqi = {} is outside the AQI scale (0-{AQI_MAX})",
            p.alert_threshold_aqi
        ));
    }

    let f = &config.forecast;
    if f.window < 2 {
        errors.push(format!("forecast.window = {} must be >= 2", f.window));
    }
    if f.features.is_empty() {
        errors.push("forecast.features must list at least one feature".to_string());
    }
    let mut seen = HashSet::new();
    for feature in &f.features {
        if !seen.insert(feature) {
            errors.push(format!("forecast.features lists '{feature}' more than once"));
        }
    }
    if f.epochs == 0 || f.batch_size == 0 {
        errors.push("forecast.epochs and forecast.batch_size must be > 0".to_string());
    }
    if !(f.learning_rate > 0.0 && f.learning_rate.is_finite()) {
        errors.push(format!("forecast.learning_rate = {} must be > 0", f.learning_rate));
    }
    if !(0.0..1.0).contains(&f.validation_split) {
        errors.push(format!(
            "forecast.validation_split = {} must be in [0, 1)",
            f.validation_split
        ));
    }

    if config.simulation.tick_secs == 0 {
        errors.push("simulation.tick_secs must be > 0".to_string());
    }
    if config.broadcast.subscriber_buffer == 0 {
        errors.push("broadcast.subscriber_buffer must be > 0".to_string());
    }
    if config.server.addr.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "server.addr = '{}' is not a socket address",
            config.server.addr
        ));
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("topic", "topic"), 0);
        assert_eq!(levenshtein("topc", "topic"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let v: toml::Value = "[mqtt]\nport = 1883\n[station]\nid = \"x\"".parse().unwrap();
        let keys = walk_toml_keys(&v, "");
        assert!(keys.contains(&"mqtt".to_string()));
        assert!(keys.contains(&"mqtt.port".to_string()));
        assert!(keys.contains(&"station.id".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[prediction]\nintervl_minutes = 10\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "prediction.intervl_minutes");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("prediction.interval_minutes")
        );
    }

    #[test]
    fn test_unknown_section_without_suggestion() {
        let warnings = validate_unknown_keys("[dashboard]\ntheme = \"dark\"\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_defaults_have_no_range_errors() {
        assert!(validate_ranges(&StationConfig::default()).is_empty());
    }

    #[test]
    fn test_range_errors_are_collected() {
        let mut cfg = StationConfig::default();
        cfg.prediction.interval_minutes = 0;
        cfg.prediction.alert_threshold_aqi = 900;
        cfg.forecast.window = 1;
        cfg.simulation.tick_secs = 0;
        cfg.server.addr = "not-an-addr".to_string();
        let errors = validate_ranges(&cfg);
        assert_eq!(errors.len(), 5, "{errors:?}");
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let mut cfg = StationConfig::default();
        let first = cfg.forecast.features[0];
        cfg.forecast.features.push(first);
        let errors = validate_ranges(&cfg);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("more than once"));
    }
}
