//! services/app/src/error.rs
//!
//! Defines the primary error type for the app service.

use crate::config::ConfigError;
use storytime_core::error::CoreError;
use storytime_core::ports::PortError;

/// The primary error type for the `app` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error surfaced by one of the core managers.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Represents an error that propagated up from one of the service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The story catalog could not be parsed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading the catalog file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
