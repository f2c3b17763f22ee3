//! crates/storytime_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any document store or screen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A story from the catalog. Immutable from the client's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display string such as "8 min".
    pub duration: String,
    pub cover: String,
    pub color: GradientPair,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl Story {
    /// The label shown on purchase buttons, "Free" when the story has no price.
    pub fn price_label(&self) -> String {
        match self.price {
            Some(price) if price > 0.0 => format!("${:.2}", price),
            _ => "Free".to_string(),
        }
    }
}

/// Two colour stops used for a story's card gradient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct GradientPair {
    pub start: String,
    pub end: String,
}

impl From<[String; 2]> for GradientPair {
    fn from([start, end]: [String; 2]) -> Self {
        Self { start, end }
    }
}

impl From<GradientPair> for [String; 2] {
    fn from(pair: GradientPair) -> Self {
        [pair.start, pair.end]
    }
}

impl Default for GradientPair {
    fn default() -> Self {
        Self {
            start: "#667eea".to_string(),
            end: "#764ba2".to_string(),
        }
    }
}

// Represents the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub email: Option<String>,
}

/// Where a voice is in its training lifecycle.
///
/// Only the training collaborator moves a voice past `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStatus {
    Waiting,
    Processing,
    Ready,
    Failed,
}

impl VoiceStatus {
    /// Label for the action button next to a voice.
    pub fn action_label(self) -> &'static str {
        match self {
            VoiceStatus::Waiting | VoiceStatus::Failed => "Setup",
            VoiceStatus::Ready | VoiceStatus::Processing => "Recalibrate",
        }
    }

    pub fn display_label(self) -> &'static str {
        match self {
            VoiceStatus::Waiting => "Waiting",
            VoiceStatus::Processing => "Processing",
            VoiceStatus::Ready => "Ready",
            VoiceStatus::Failed => "Failed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoiceStatus::Waiting => "waiting",
            VoiceStatus::Processing => "processing",
            VoiceStatus::Ready => "ready",
            VoiceStatus::Failed => "failed",
        }
    }
}

/// A personalised narration voice belonging to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct AiVoice {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub status: VoiceStatus,
    pub is_default: bool,
    /// Server-assigned.
    pub created_at: DateTime<Utc>,
    /// Server-assigned.
    pub updated_at: DateTime<Utc>,
}

impl AiVoice {
    pub fn is_ready(&self) -> bool {
        self.status == VoiceStatus::Ready
    }
}

/// A user-facing alert dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}
