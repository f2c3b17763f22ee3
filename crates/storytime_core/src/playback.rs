//! crates/storytime_core/src/playback.rs
//!
//! The single, process-wide now-playing session shared by the mini player
//! and the full player, plus the short preview played before purchase.
//! Purely in memory; nothing here is persisted.

use crate::domain::Story;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub const DEFAULT_DURATION_SECS: u32 = 480;
pub const SEEK_STEP_SECS: u32 = 15;

/// Length of a store preview.
pub const PREVIEW_SECS: u32 = 10;
/// How often a playing preview should be ticked.
pub const PREVIEW_TICK: Duration = Duration::from_millis(100);
const PREVIEW_TICKS: u32 = PREVIEW_SECS * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Closed,
    Expanded,
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// A snapshot of the now-playing session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// A copy of the story, not the catalog's entry.
    pub current_story: Option<Story>,
    pub is_playing: bool,
    pub is_minimized: bool,
    /// Seconds.
    pub current_time: u32,
    /// Seconds.
    pub duration: u32,
}

impl PlaybackSession {
    fn closed(duration: u32) -> Self {
        Self {
            current_story: None,
            is_playing: false,
            is_minimized: false,
            current_time: 0,
            duration,
        }
    }

    pub fn state(&self) -> PlayerState {
        match (&self.current_story, self.is_minimized) {
            (None, _) => PlayerState::Closed,
            (Some(_), false) => PlayerState::Expanded,
            (Some(_), true) => PlayerState::Minimized,
        }
    }

    pub fn is_open(&self) -> bool {
        self.current_story.is_some()
    }

    pub fn shows_mini_player(&self) -> bool {
        self.state() == PlayerState::Minimized
    }

    pub fn progress_percent(&self) -> f32 {
        if self.duration == 0 {
            return 0.0;
        }
        self.current_time as f32 / self.duration as f32 * 100.0
    }
}

/// Formats seconds as `m:ss`.
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

//=========================================================================================
// PlaybackCoordinator
//=========================================================================================

pub struct PlaybackCoordinator {
    session: watch::Sender<PlaybackSession>,
}

impl Default for PlaybackCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_SECS)
    }
}

impl PlaybackCoordinator {
    pub fn new(default_duration: u32) -> Self {
        let (session, _) = watch::channel(PlaybackSession::closed(default_duration));
        Self { session }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.session.subscribe()
    }

    pub fn session(&self) -> PlaybackSession {
        self.session.borrow().clone()
    }

    pub fn state(&self) -> PlayerState {
        self.session.borrow().state()
    }

    pub fn current_story(&self) -> Option<Story> {
        self.session.borrow().current_story.clone()
    }

    /// Opens `story` expanded, replacing whatever was open.
    pub fn open(&self, story: Story) {
        debug!(story_id = %story.id, "Opening player.");
        self.session.send_modify(|s| {
            s.current_story = Some(story);
            s.is_minimized = false;
            s.current_time = 0;
        });
    }

    pub fn close(&self) {
        debug!("Closing player.");
        self.session.send_modify(|s| {
            s.current_story = None;
            s.is_playing = false;
            s.is_minimized = false;
            s.current_time = 0;
        });
    }

    pub fn minimize(&self) {
        self.session.send_if_modified(|s| {
            if s.state() != PlayerState::Expanded {
                return false;
            }
            s.is_minimized = true;
            true
        });
    }

    pub fn expand(&self) {
        self.session.send_if_modified(|s| {
            if s.state() != PlayerState::Minimized {
                return false;
            }
            s.is_minimized = false;
            true
        });
    }

    pub fn play(&self) {
        self.set_playing(true);
    }

    pub fn pause(&self) {
        self.set_playing(false);
    }

    pub fn toggle_play(&self) {
        let playing = self.session.borrow().is_playing;
        self.set_playing(!playing);
    }

    fn set_playing(&self, playing: bool) {
        self.session.send_if_modified(|s| {
            if !s.is_open() || s.is_playing == playing {
                return false;
            }
            s.is_playing = playing;
            true
        });
    }

    /// Advances one second while playing. At the end, stops and rewinds.
    pub fn tick(&self) {
        self.session.send_if_modified(|s| {
            if !s.is_open() || !s.is_playing {
                return false;
            }
            if s.current_time >= s.duration {
                s.is_playing = false;
                s.current_time = 0;
            } else {
                s.current_time += 1;
            }
            true
        });
    }

    pub fn seek(&self, direction: SeekDirection) {
        self.session.send_if_modified(|s| {
            if !s.is_open() {
                return false;
            }
            s.current_time = match direction {
                SeekDirection::Forward => {
                    s.current_time.saturating_add(SEEK_STEP_SECS).min(s.duration)
                }
                SeekDirection::Backward => s.current_time.saturating_sub(SEEK_STEP_SECS),
            };
            true
        });
    }

    pub fn seek_to(&self, seconds: u32) {
        self.session.send_if_modified(|s| {
            if !s.is_open() {
                return false;
            }
            s.current_time = seconds.min(s.duration);
            true
        });
    }

    pub fn set_duration(&self, seconds: u32) {
        self.session.send_modify(|s| {
            s.duration = seconds;
            s.current_time = s.current_time.min(seconds);
        });
    }

    /// Shows the full player for `story`, or for the current story when `None`.
    /// The full player minimizes when the returned scope is dropped.
    pub fn present(self: &Arc<Self>, story: Option<Story>) -> FullPlayerScope {
        match story {
            Some(story) => self.open(story),
            None => self.expand(),
        }
        FullPlayerScope {
            coordinator: Arc::clone(self),
        }
    }
}

/// Held for as long as the full player is on screen.
pub struct FullPlayerScope {
    coordinator: Arc<PlaybackCoordinator>,
}

impl FullPlayerScope {
    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }
}

impl Drop for FullPlayerScope {
    fn drop(&mut self) {
        self.coordinator.minimize();
    }
}

//=========================================================================================
// PreviewSession
//=========================================================================================

/// The preview played from a store listing. It is owned by the preview
/// screen and never touches the now-playing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSession {
    is_playing: bool,
    /// Elapsed time in `PREVIEW_TICK` steps.
    ticks: u32,
}

impl PreviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the preview from the beginning.
    pub fn play(&mut self) {
        self.is_playing = true;
        self.ticks = 0;
    }

    /// Stops and rewinds. Also used when the preview screen closes.
    pub fn stop(&mut self) {
        self.is_playing = false;
        self.ticks = 0;
    }

    /// Advances one `PREVIEW_TICK`. Returns `true` on the tick that ends
    /// the preview, after which the session is stopped and rewound.
    pub fn tick(&mut self) -> bool {
        if !self.is_playing {
            return false;
        }
        self.ticks += 1;
        if self.ticks >= PREVIEW_TICKS {
            self.stop();
            return true;
        }
        false
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whole seconds elapsed.
    pub fn elapsed_secs(&self) -> u32 {
        self.ticks / 10
    }

    pub fn progress_percent(&self) -> f32 {
        self.ticks as f32 * 100.0 / PREVIEW_TICKS as f32
    }

    /// `"3s / 10s"`.
    pub fn label(&self) -> String {
        format!("{}s / {}s", self.elapsed_secs(), PREVIEW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn story(id: &str) -> Story {
        Catalog::bundled_sample().get(id).unwrap().clone()
    }

    #[test]
    fn starts_closed() {
        let player = PlaybackCoordinator::default();
        let session = player.session();
        assert_eq!(session.state(), PlayerState::Closed);
        assert_eq!(session.duration, DEFAULT_DURATION_SECS);
        assert!(!session.shows_mini_player());
    }

    #[test]
    fn open_replaces_current_story() {
        let player = PlaybackCoordinator::default();
        player.open(story("1"));
        player.seek(SeekDirection::Forward);
        player.open(story("2"));

        let session = player.session();
        assert_eq!(session.current_story.as_ref().unwrap().id, "2");
        assert_eq!(session.current_time, 0);
        assert_eq!(session.state(), PlayerState::Expanded);
        assert!(!session.is_playing);

        player.play();
        player.open(story("3"));
        assert!(player.session().is_playing);
    }

    #[test]
    fn close_resets_everything() {
        let player = PlaybackCoordinator::default();
        player.open(story("1"));
        player.play();
        player.tick();
        player.close();

        let session = player.session();
        assert!(session.current_story.is_none());
        assert!(!session.is_playing);
        assert_eq!(session.current_time, 0);
        assert_eq!(session.state(), PlayerState::Closed);
    }

    #[test]
    fn minimize_and_expand_only_apply_when_open() {
        let player = PlaybackCoordinator::default();
        player.minimize();
        assert_eq!(player.state(), PlayerState::Closed);

        player.open(story("3"));
        player.minimize();
        assert_eq!(player.state(), PlayerState::Minimized);
        assert!(player.session().shows_mini_player());

        player.expand();
        assert_eq!(player.state(), PlayerState::Expanded);
    }

    #[test]
    fn reopening_a_minimized_player_expands_it() {
        let player = PlaybackCoordinator::default();
        player.open(story("1"));
        player.minimize();
        player.open(story("4"));
        assert_eq!(player.state(), PlayerState::Expanded);
    }

    #[test]
    fn play_requires_an_open_story() {
        let player = PlaybackCoordinator::default();
        player.play();
        assert!(!player.session().is_playing);

        player.open(story("1"));
        player.toggle_play();
        assert!(player.session().is_playing);
        player.toggle_play();
        assert!(!player.session().is_playing);
    }

    #[test]
    fn tick_rewinds_at_the_end() {
        let player = PlaybackCoordinator::new(2);
        player.open(story("1"));
        player.play();
        player.tick();
        player.tick();
        assert_eq!(player.session().current_time, 2);
        assert!(player.session().is_playing);

        player.tick();
        let session = player.session();
        assert_eq!(session.current_time, 0);
        assert!(!session.is_playing);
    }

    #[test]
    fn tick_is_idle_while_paused() {
        let player = PlaybackCoordinator::default();
        player.open(story("1"));
        player.tick();
        assert_eq!(player.session().current_time, 0);
    }

    #[test]
    fn seek_is_clamped() {
        let player = PlaybackCoordinator::new(20);
        player.open(story("1"));
        player.seek(SeekDirection::Backward);
        assert_eq!(player.session().current_time, 0);
        player.seek(SeekDirection::Forward);
        assert_eq!(player.session().current_time, 15);
        player.seek(SeekDirection::Forward);
        assert_eq!(player.session().current_time, 20);
        player.seek_to(500);
        assert_eq!(player.session().current_time, 20);
    }

    #[test]
    fn leaving_the_full_player_minimizes() {
        let player = Arc::new(PlaybackCoordinator::default());
        {
            let scope = player.present(Some(story("2")));
            assert_eq!(scope.coordinator().state(), PlayerState::Expanded);
        }
        assert_eq!(player.state(), PlayerState::Minimized);

        {
            let _scope = player.present(None);
            assert_eq!(player.state(), PlayerState::Expanded);
        }
        assert_eq!(player.state(), PlayerState::Minimized);
    }

    #[test]
    fn closing_inside_the_full_player_stays_closed() {
        let player = Arc::new(PlaybackCoordinator::default());
        {
            let scope = player.present(Some(story("2")));
            scope.coordinator().close();
        }
        assert_eq!(player.state(), PlayerState::Closed);
    }

    #[test]
    fn formats_time_and_progress() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(75), "1:15");
        assert_eq!(format_time(480), "8:00");

        let player = PlaybackCoordinator::new(200);
        player.open(story("1"));
        player.seek_to(50);
        assert_eq!(player.session().progress_percent(), 25.0);
    }

    #[test]
    fn seek_forward_saturates_near_the_top_of_the_range() {
        let player = PlaybackCoordinator::new(u32::MAX);
        player.open(story("1"));
        player.seek_to(u32::MAX - 3);
        player.seek(SeekDirection::Forward);
        assert_eq!(player.session().current_time, u32::MAX);
    }

    #[test]
    fn preview_stops_by_itself_after_ten_seconds() {
        let mut preview = PreviewSession::new();
        assert!(!preview.tick());

        preview.play();
        for _ in 0..35 {
            assert!(!preview.tick());
        }
        assert_eq!(preview.elapsed_secs(), 3);
        assert_eq!(preview.label(), "3s / 10s");
        assert_eq!(preview.progress_percent(), 35.0);

        let finished = (0..65).filter(|_| preview.tick()).count();
        assert_eq!(finished, 1);
        assert!(!preview.is_playing());
        assert_eq!(preview.elapsed_secs(), 0);
    }

    #[test]
    fn stopping_a_preview_rewinds_it() {
        let mut preview = PreviewSession::new();
        preview.play();
        for _ in 0..20 {
            preview.tick();
        }
        preview.stop();
        assert_eq!(preview, PreviewSession::new());

        preview.play();
        preview.tick();
        preview.play();
        assert_eq!(preview.elapsed_secs(), 0);
        assert!(preview.is_playing());
    }

    #[test]
    fn preview_leaves_the_now_playing_session_alone() {
        let player = PlaybackCoordinator::default();
        player.open(story("1"));
        let before = player.session();

        let mut preview = PreviewSession::new();
        preview.play();
        preview.tick();

        assert_eq!(player.session(), before);
    }
}
