pub mod auth;
pub mod memory_store;
pub mod notifier;
pub mod trainer;

pub use auth::SessionAuth;
pub use memory_store::InMemoryStore;
pub use notifier::{CollectingNotifier, LogNotifier};
pub use trainer::{SimulatedTrainer, TrainingOutcome};
