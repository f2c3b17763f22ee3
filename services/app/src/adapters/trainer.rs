//! services/app/src/adapters/trainer.rs
//!
//! A stand-in for the external voice-training service. It writes status
//! transitions straight to the voice document, exactly as the real trainer
//! would; the core only ever sees the resulting snapshots.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storytime_core::domain::VoiceStatus;
use storytime_core::ports::{fields_of, PortResult, RemoteStore};
use storytime_core::voice::voice_path;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    Ready,
    Failed,
}

impl From<TrainingOutcome> for VoiceStatus {
    fn from(outcome: TrainingOutcome) -> Self {
        match outcome {
            TrainingOutcome::Ready => VoiceStatus::Ready,
            TrainingOutcome::Failed => VoiceStatus::Failed,
        }
    }
}

#[derive(Clone)]
pub struct SimulatedTrainer {
    store: Arc<dyn RemoteStore>,
    step: Duration,
}

impl SimulatedTrainer {
    pub fn new(store: Arc<dyn RemoteStore>, step: Duration) -> Self {
        Self { store, step }
    }

    /// Writes a single status for a voice.
    pub async fn set_status(
        &self,
        user_id: &str,
        voice_id: &str,
        status: VoiceStatus,
    ) -> PortResult<()> {
        self.store
            .update(
                &voice_path(user_id, voice_id),
                fields_of(json!({ "status": status })),
            )
            .await?;
        info!(voice_id, status = status.as_str(), "Training status written.");
        Ok(())
    }

    /// Moves a voice through `processing` to the outcome, pausing one step
    /// before each write.
    pub async fn train(
        &self,
        user_id: &str,
        voice_id: &str,
        outcome: TrainingOutcome,
    ) -> PortResult<()> {
        tokio::time::sleep(self.step).await;
        self.set_status(user_id, voice_id, VoiceStatus::Processing).await?;
        tokio::time::sleep(self.step).await;
        self.set_status(user_id, voice_id, outcome.into()).await
    }

    /// Runs `train` in the background.
    pub fn spawn(
        &self,
        user_id: String,
        voice_id: String,
        outcome: TrainingOutcome,
    ) -> JoinHandle<()> {
        let trainer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = trainer.train(&user_id, &voice_id, outcome).await {
                warn!(voice_id = %voice_id, error = %e, "Voice training aborted.");
            }
        })
    }
}
