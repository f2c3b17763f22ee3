//! crates/storytime_core/src/recording.rs
//!
//! The guided recording a parent goes through before a voice is created:
//! one sample per phrase, stepped through in order.

use tracing::debug;

pub const RECORDING_PHRASES: [&str; 5] = [
    "Once upon a time, in a magical kingdom far away...",
    "The little dragon loved to read bedtime stories to all the forest animals.",
    "Luna looked up at the sparkling stars and made a wish.",
    "The friendly giant lived in a castle made of clouds.",
    "Every night, the moon would tell stories to the sleeping world below.",
];

/// What `next` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved on to the given step.
    Moved(usize),
    /// The current phrase still needs a recording, or a recording is running.
    Blocked,
    /// Every phrase is recorded; the voice can be created.
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSession {
    step: usize,
    is_recording: bool,
    recorded: [bool; RECORDING_PHRASES.len()],
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn phrase(&self) -> &'static str {
        RECORDING_PHRASES[self.step]
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_recorded(&self, step: usize) -> bool {
        self.recorded.get(step).copied().unwrap_or(false)
    }

    pub fn all_recorded(&self) -> bool {
        self.recorded.iter().all(|r| *r)
    }

    pub fn is_last_step(&self) -> bool {
        self.step + 1 == RECORDING_PHRASES.len()
    }

    /// Starts a recording, or stops the running one and keeps it.
    /// Returns whether a recording is now running.
    pub fn toggle_recording(&mut self) -> bool {
        if self.is_recording {
            self.recorded[self.step] = true;
            debug!(step = self.step, "Phrase recorded.");
        }
        self.is_recording = !self.is_recording;
        self.is_recording
    }

    /// Throws away the current phrase's recording.
    pub fn rerecord(&mut self) {
        self.is_recording = false;
        self.recorded[self.step] = false;
    }

    pub fn next(&mut self) -> StepOutcome {
        if self.is_recording || !self.recorded[self.step] {
            return StepOutcome::Blocked;
        }
        if !self.is_last_step() {
            self.step += 1;
            return StepOutcome::Moved(self.step);
        }
        if self.all_recorded() {
            StepOutcome::Complete
        } else {
            StepOutcome::Blocked
        }
    }

    /// Steps back. Refused on the first step and while recording.
    pub fn previous(&mut self) -> bool {
        if self.is_recording || self.step == 0 {
            return false;
        }
        self.step -= 1;
        true
    }

    /// `"2 of 5"`.
    pub fn progress_label(&self) -> String {
        format!("{} of {}", self.step + 1, RECORDING_PHRASES.len())
    }
}
