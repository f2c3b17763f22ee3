//! services/app/src/state.rs
//!
//! The application's shared state: every service object, constructed once
//! at startup and handed to whatever drives the UI.

use crate::adapters::{SessionAuth, SimulatedTrainer};
use crate::config::Config;
use crate::error::AppError;
use std::sync::Arc;
use storytime_core::catalog::Catalog;
use storytime_core::library::LibraryManager;
use storytime_core::playback::PlaybackCoordinator;
use storytime_core::ports::{Notifier, RemoteStore};
use storytime_core::voice::VoiceManager;
use tracing::info;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RemoteStore>,
    pub auth: Arc<SessionAuth>,
    pub notifier: Arc<dyn Notifier>,
    pub catalog: Arc<Catalog>,
    pub voices: Arc<VoiceManager>,
    pub library: Arc<LibraryManager>,
    pub player: Arc<PlaybackCoordinator>,
    pub trainer: SimulatedTrainer,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn RemoteStore>,
        auth: Arc<SessionAuth>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        let catalog = Arc::new(load_catalog(&config)?);
        info!(stories = catalog.len(), "Catalog loaded.");

        let voices = Arc::new(VoiceManager::new(
            store.clone(),
            auth.clone(),
            notifier.clone(),
        ));
        let library = Arc::new(LibraryManager::new(notifier.clone()));
        let player = Arc::new(PlaybackCoordinator::new(config.player_default_duration));
        let trainer = SimulatedTrainer::new(store.clone(), config.training_step);

        Ok(Self {
            config,
            store,
            auth,
            notifier,
            catalog,
            voices,
            library,
            player,
            trainer,
        })
    }
}

/// Reads the configured catalog file, or falls back to the bundled one.
pub fn load_catalog(config: &Config) -> Result<Catalog, AppError> {
    match &config.catalog_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(Catalog::from_json(&json)?)
        }
        None => Ok(Catalog::bundled()?),
    }
}
