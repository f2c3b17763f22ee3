//! services/app/src/bin/app.rs
//!
//! Boots the Storytime services and drives one scripted session against
//! them: buying and favoriting stories, training voices, switching the
//! default voice and using the player.

use app_lib::{
    adapters::{InMemoryStore, LogNotifier, SessionAuth, TrainingOutcome},
    config::Config,
    error::AppError,
    state::AppState,
};
use std::sync::Arc;
use std::time::Duration;
use storytime_core::domain::{AiVoice, User};
use storytime_core::playback::{format_time, PreviewSession, SeekDirection};
use storytime_core::recording::{RecordingSession, StepOutcome};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting Storytime...");

    // --- 2. Initialize Adapters & Shared State ---
    let store = Arc::new(InMemoryStore::new());
    let auth = Arc::new(SessionAuth::signed_in(User {
        user_id: config.user_id.clone(),
        email: config.user_email.clone(),
    }));
    let state = AppState::new(config.clone(), store, auth, Arc::new(LogNotifier))?;

    // --- 3. Attach the Voice Listener ---
    let subscription = state.voices.attach().await?;

    library_walkthrough(&state);
    voice_walkthrough(&state).await?;
    player_walkthrough(&state);

    // --- 4. Tear Down ---
    subscription.detach().await;
    info!("Session finished.");
    Ok(())
}

fn library_walkthrough(state: &AppState) {
    let library = &state.library;
    let Some(first) = state.catalog.stories().first().cloned() else {
        warn!("Catalog is empty; skipping library walkthrough.");
        return;
    };

    for story in state.catalog.stories().iter().skip(1) {
        library.toggle_wishlist(&story.id);
    }
    library.purchase(&first);
    library.toggle_favorite(&first.id);
    if let Some(second) = state.catalog.stories().get(1) {
        // Not owned, so this is refused.
        library.toggle_favorite(&second.id);

        let mut preview = PreviewSession::new();
        preview.play();
        while !preview.tick() {}
        info!(story = %second.title, "Preview finished.");
        library.purchase(second);
    }

    let titles = |stories: Vec<storytime_core::Story>| -> Vec<String> {
        stories.into_iter().map(|s| s.title).collect()
    };
    info!(owned = ?titles(library.owned_stories(&state.catalog)), "Library.");
    info!(favorites = ?titles(library.favorite_stories(&state.catalog)), "Favorites.");
    info!(wishlist = ?titles(library.wishlisted_stories(&state.catalog)), "Wishlist.");
}

async fn voice_walkthrough(state: &AppState) -> Result<(), AppError> {
    let voices = &state.voices;
    let user_id = state.config.user_id.clone();
    let mut rx = voices.voices();
    let timeout = state.config.training_step * 10 + Duration::from_secs(2);

    let mut recording = RecordingSession::new();
    while recording.next() != StepOutcome::Complete {
        recording.toggle_recording();
        recording.toggle_recording();
        info!(step = %recording.progress_label(), phrase = recording.phrase(), "Recorded.");
    }

    let first = voices.create_voice("Bedtime Voice").await?;
    let second = voices.create_voice("Adventure Voice").await?;
    let third = voices.create_voice("Whisper Voice").await?;

    state
        .trainer
        .train(&user_id, &first, TrainingOutcome::Ready)
        .await?;
    state
        .trainer
        .train(&user_id, &second, TrainingOutcome::Ready)
        .await?;
    let _failing = state
        .trainer
        .spawn(user_id.clone(), third.clone(), TrainingOutcome::Failed);

    let list = wait_for(&mut rx, timeout, |v| {
        default_id(v).as_deref() == Some(first.as_str())
    })
    .await?;
    info!(default = ?default_id(&list), "First ready voice became the default.");

    // Not ready, so refused with an alert.
    let _ = voices.set_default(&third).await;

    voices.set_default(&second).await?;
    wait_for(&mut rx, timeout, |v| {
        default_id(v).as_deref() == Some(second.as_str())
    })
    .await?;
    voices.rename_voice(&second, "Adventure Voice (Dad)").await?;

    voices.delete_voice(&second).await?;
    let list = wait_for(&mut rx, timeout, |v| {
        v.iter().all(|voice| voice.id != second) && default_id(v).is_some()
    })
    .await?;
    info!(default = ?default_id(&list), "Default voice repaired after delete.");

    for voice in voices.current_voices() {
        info!(
            name = %voice.name,
            status = voice.status.display_label(),
            action = voice.status.action_label(),
            is_default = voice.is_default,
            "Voice."
        );
    }
    Ok(())
}

fn player_walkthrough(state: &AppState) {
    let Some(story) = state.catalog.stories().first().cloned() else {
        return;
    };
    let player = &state.player;
    {
        let _full_player = player.present(Some(story));
        player.play();
        for _ in 0..5 {
            player.tick();
        }
        player.seek(SeekDirection::Forward);
        let session = player.session();
        info!(
            at = %format_time(session.current_time),
            of = %format_time(session.duration),
            progress = session.progress_percent(),
            "Playing."
        );
    }
    info!(mini_player = player.session().shows_mini_player(), "Left the full player.");
    player.close();
    info!(state = ?player.state(), "Player closed.");
}

fn default_id(voices: &[AiVoice]) -> Option<String> {
    voices.iter().find(|v| v.is_default).map(|v| v.id.clone())
}

/// Waits until the voice list satisfies `done`.
async fn wait_for<F>(
    rx: &mut watch::Receiver<Vec<AiVoice>>,
    timeout: Duration,
    done: F,
) -> Result<Vec<AiVoice>, AppError>
where
    F: Fn(&[AiVoice]) -> bool,
{
    let wait = async {
        loop {
            {
                let current = rx.borrow_and_update();
                if done(&current) {
                    return Ok::<_, AppError>(current.to_vec());
                }
            }
            rx.changed()
                .await
                .map_err(|_| AppError::Internal("voice listener stopped".to_string()))?;
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| AppError::Internal("timed out waiting for voices".to_string()))?
}
