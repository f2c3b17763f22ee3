//! crates/storytime_core/src/error.rs
//!
//! The error taxonomy surfaced by the core managers.

use crate::domain::Alert;
use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A required field was empty. Shown inline, never as an alert.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No signed-in user")]
    Auth,

    /// Only ready voices can be made the default.
    #[error("Voice {voice_id} is not ready")]
    NotReady { voice_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store error: {0}")]
    Remote(PortError),
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Remote(other),
        }
    }
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// The alert a failure produces, if any.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            CoreError::Validation(_) => None,
            CoreError::Auth => Some(Alert::new(
                "Not Signed In",
                "Please sign in to manage your AI voices.",
            )),
            CoreError::NotReady { .. } => Some(Alert::new(
                "Voice Not Ready",
                "Only ready voices can be set as default.",
            )),
            CoreError::NotFound(_) => Some(Alert::new(
                "Not Found",
                "That voice no longer exists.",
            )),
            CoreError::Remote(PortError::Unauthorized) => Some(Alert::new(
                "Not Signed In",
                "Your session has expired. Please sign in again.",
            )),
            CoreError::Remote(_) => Some(Alert::new(
                "Error",
                "Something went wrong. Please try again.",
            )),
        }
    }
}
