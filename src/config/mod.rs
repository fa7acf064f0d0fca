//! Station Configuration Module
//!
//! Operator-tunable settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `AIRWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `airwatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Secrets and the listen address are then overridden from the environment
//! (`TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `AIRWATCH_SERVER_ADDR`).
//!
//! The loaded `StationConfig` is handed to each service at construction;
//! there is no process-global copy.

mod station_config;
pub mod defaults;
pub mod validation;

pub use station_config::*;
