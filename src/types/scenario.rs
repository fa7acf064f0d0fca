//! Simulation scenarios

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named synthetic data profile.
///
/// Parsing rejects anything outside this set, so the rest of the system never
/// sees an unknown scenario string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Normal,
    Hot,
    Cold,
    Fire,
    Polluted,
    Raining,
}

impl Scenario {
    /// Every scenario, in display order.
    pub const ALL: [Scenario; 6] = [
        Scenario::Normal,
        Scenario::Hot,
        Scenario::Cold,
        Scenario::Fire,
        Scenario::Polluted,
        Scenario::Raining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Hot => "hot",
            Scenario::Cold => "cold",
            Scenario::Fire => "fire",
            Scenario::Polluted => "polluted",
            Scenario::Raining => "raining",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a scenario name is not one of [`Scenario::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scenario '{0}', must be one of: normal, hot, cold, fire, polluted, raining")]
pub struct ScenarioError(pub String);

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| ScenarioError(s.to_string()))
    }
}
