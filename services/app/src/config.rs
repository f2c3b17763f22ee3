//! services/app/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use storytime_core::playback::DEFAULT_DURATION_SECS;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    /// `None` means the bundled catalog.
    pub catalog_path: Option<PathBuf>,
    pub user_id: String,
    pub user_email: Option<String>,
    pub training_step: Duration,
    pub player_default_duration: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            catalog_path: None,
            user_id: "demo-user".to_string(),
            user_email: None,
            training_step: Duration::from_millis(500),
            player_default_duration: DEFAULT_DURATION_SECS,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level = match lookup("RUST_LOG") {
            Some(raw) => raw.parse::<Level>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RUST_LOG".to_string(),
                    format!("'{}' is not a valid log level", raw),
                )
            })?,
            None => defaults.log_level,
        };

        let catalog_path = lookup("CATALOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        // --- Session Settings ---
        let user_id = lookup("STORYTIME_USER_ID").unwrap_or(defaults.user_id);
        if user_id.trim().is_empty() {
            return Err(ConfigError::MissingVar("STORYTIME_USER_ID".to_string()));
        }
        let user_email = lookup("STORYTIME_USER_EMAIL");

        // --- Collaborator and Player Settings ---
        let training_step = match lookup("TRAINING_STEP_MS") {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("TRAINING_STEP_MS".to_string(), e.to_string())
            })?),
            None => defaults.training_step,
        };

        let player_default_duration = match lookup("PLAYER_DEFAULT_DURATION_SECS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("PLAYER_DEFAULT_DURATION_SECS".to_string(), e.to_string())
            })?,
            None => defaults.player_default_duration,
        };

        Ok(Self {
            log_level,
            catalog_path,
            user_id,
            user_email,
            training_step,
            player_default_duration,
        })
    }
}
