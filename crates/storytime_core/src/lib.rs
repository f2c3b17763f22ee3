pub mod catalog;
pub mod domain;
pub mod error;
pub mod library;
pub mod playback;
pub mod ports;
pub mod recording;
pub mod voice;

pub use catalog::Catalog;
pub use domain::{AiVoice, Alert, GradientPair, Story, User, VoiceStatus};
pub use error::{CoreError, CoreResult};
pub use library::{LibraryManager, LibraryState};
pub use playback::{
    FullPlayerScope, PlaybackCoordinator, PlaybackSession, PlayerState, PreviewSession,
    SeekDirection,
};
pub use ports::{
    AuthSession, BatchUpdate, Document, Fields, Notifier, OrderBy, OrderKey, PortError,
    PortResult, QuerySnapshot, RemoteStore, SnapshotStream, WriteBatch,
};
pub use recording::{RecordingSession, StepOutcome};
pub use voice::{DefaultRepair, VoiceManager, VoiceSubscription};
