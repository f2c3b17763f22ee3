//! crates/storytime_core/src/library.rs
//!
//! Ownership, favorites and wishlist for the signed-in user.
//!
//! Invariants held at every observable state:
//! - every favorite is owned
//! - nothing is both owned and wishlisted

use crate::catalog::Catalog;
use crate::domain::{Alert, Story};
use crate::ports::Notifier;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

//=========================================================================================
// LibraryState (pure set logic)
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryState {
    owned: HashSet<String>,
    favorites: HashSet<String>,
    wishlist: HashSet<String>,
}

impl LibraryState {
    /// Builds a state from persisted sets, dropping entries that would break
    /// the invariants.
    pub fn from_parts<I, J, K>(owned: I, favorites: J, wishlist: K) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
        K: IntoIterator<Item = String>,
    {
        let owned: HashSet<String> = owned.into_iter().collect();
        let favorites = favorites
            .into_iter()
            .filter(|id| owned.contains(id))
            .collect();
        let wishlist = wishlist
            .into_iter()
            .filter(|id| !owned.contains(id))
            .collect();
        Self {
            owned,
            favorites,
            wishlist,
        }
    }

    /// Returns false when the story was already owned.
    pub fn add_to_library(&mut self, story_id: &str) -> bool {
        self.wishlist.remove(story_id);
        self.owned.insert(story_id.to_string())
    }

    pub fn remove_from_library(&mut self, story_id: &str) -> bool {
        self.favorites.remove(story_id);
        self.owned.remove(story_id)
    }

    /// Returns false, changing nothing, when the story is not owned.
    pub fn toggle_favorite(&mut self, story_id: &str) -> bool {
        if !self.owned.contains(story_id) {
            return false;
        }
        if !self.favorites.remove(story_id) {
            self.favorites.insert(story_id.to_string());
        }
        true
    }

    /// Returns false, changing nothing, when the story is owned.
    pub fn toggle_wishlist(&mut self, story_id: &str) -> bool {
        if self.owned.contains(story_id) {
            return false;
        }
        if !self.wishlist.remove(story_id) {
            self.wishlist.insert(story_id.to_string());
        }
        true
    }

    pub fn is_owned(&self, story_id: &str) -> bool {
        self.owned.contains(story_id)
    }

    pub fn is_favorited(&self, story_id: &str) -> bool {
        self.favorites.contains(story_id)
    }

    pub fn is_wishlisted(&self, story_id: &str) -> bool {
        self.wishlist.contains(story_id)
    }

    pub fn owned_ids(&self) -> &HashSet<String> {
        &self.owned
    }

    pub fn favorite_ids(&self) -> &HashSet<String> {
        &self.favorites
    }

    pub fn wishlist_ids(&self) -> &HashSet<String> {
        &self.wishlist
    }
}

//=========================================================================================
// LibraryManager (shared service object)
//=========================================================================================

/// The single library service shared by every screen.
///
/// State is held in a `watch` channel so screens can re-render on change;
/// it is only ever mutated through the methods below.
pub struct LibraryManager {
    state: watch::Sender<LibraryState>,
    notifier: Arc<dyn Notifier>,
}

impl LibraryManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_state(LibraryState::default(), notifier)
    }

    pub fn with_state(state: LibraryState, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(state);
        Self { state, notifier }
    }

    pub fn subscribe(&self) -> watch::Receiver<LibraryState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LibraryState {
        self.state.borrow().clone()
    }

    pub fn add_to_library(&self, story_id: &str) {
        let added = self
            .state
            .send_if_modified(|state| {
                let was_wishlisted = state.is_wishlisted(story_id);
                state.add_to_library(story_id) || was_wishlisted
            });
        if added {
            debug!(story_id, "Story added to library.");
        }
    }

    /// Adds the story to the library and confirms the purchase to the user.
    pub fn purchase(&self, story: &Story) {
        self.add_to_library(&story.id);
        info!(story_id = %story.id, title = %story.title, "Story purchased.");
        self.notifier.alert(Alert::new(
            "Purchase Successful",
            format!(
                "You have purchased \"{}\" for {}.",
                story.title,
                story.price_label()
            ),
        ));
    }

    pub fn remove_from_library(&self, story_id: &str) {
        if self
            .state
            .send_if_modified(|state| state.remove_from_library(story_id))
        {
            debug!(story_id, "Story removed from library.");
        }
    }

    pub fn toggle_favorite(&self, story_id: &str) {
        if !self
            .state
            .send_if_modified(|state| state.toggle_favorite(story_id))
        {
            debug!(story_id, "Ignored favorite toggle for a story that is not owned.");
        }
    }

    pub fn toggle_wishlist(&self, story_id: &str) {
        if !self
            .state
            .send_if_modified(|state| state.toggle_wishlist(story_id))
        {
            debug!(story_id, "Ignored wishlist toggle for an owned story.");
        }
    }

    pub fn is_owned(&self, story_id: &str) -> bool {
        self.state.borrow().is_owned(story_id)
    }

    pub fn is_favorited(&self, story_id: &str) -> bool {
        self.state.borrow().is_favorited(story_id)
    }

    pub fn is_wishlisted(&self, story_id: &str) -> bool {
        self.state.borrow().is_wishlisted(story_id)
    }

    /// Owned stories, in catalog order.
    pub fn owned_stories(&self, catalog: &Catalog) -> Vec<Story> {
        let state = self.state.borrow();
        catalog.select(|story| state.is_owned(&story.id))
    }

    pub fn favorite_stories(&self, catalog: &Catalog) -> Vec<Story> {
        let state = self.state.borrow();
        catalog.select(|story| state.is_favorited(&story.id))
    }

    pub fn wishlisted_stories(&self, catalog: &Catalog) -> Vec<Story> {
        let state = self.state.borrow();
        catalog.select(|story| state.is_wishlisted(&story.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Alerts(Mutex<Vec<Alert>>);

    impl Notifier for Alerts {
        fn alert(&self, alert: Alert) {
            self.0.lock().unwrap().push(alert);
        }
    }

    fn assert_invariants(state: &LibraryState) {
        assert!(state.favorite_ids().is_subset(state.owned_ids()));
        assert!(state.wishlist_ids().is_disjoint(state.owned_ids()));
    }

    #[test]
    fn adding_removes_from_wishlist() {
        let mut state = LibraryState::default();
        assert!(state.toggle_wishlist("2"));
        assert!(state.is_wishlisted("2"));

        assert!(state.add_to_library("2"));
        assert!(state.is_owned("2"));
        assert!(!state.is_wishlisted("2"));
        assert!(!state.is_favorited("2"));
        assert_invariants(&state);
    }

    #[test]
    fn adding_twice_is_a_no_op() {
        let mut state = LibraryState::default();
        assert!(state.add_to_library("1"));
        state.toggle_favorite("1");
        assert!(!state.add_to_library("1"));
        assert!(state.is_favorited("1"));
    }

    #[test]
    fn removing_cascades_to_favorites() {
        let mut state = LibraryState::default();
        state.add_to_library("1");
        state.toggle_favorite("1");
        assert!(state.is_favorited("1"));

        assert!(state.remove_from_library("1"));
        assert!(!state.is_owned("1"));
        assert!(!state.is_favorited("1"));
        assert_invariants(&state);
    }

    #[test]
    fn favorite_requires_ownership() {
        let mut state = LibraryState::default();
        let before = state.clone();
        assert!(!state.toggle_favorite("9"));
        assert_eq!(state, before);
    }

    #[test]
    fn wishlist_refused_while_owned() {
        let mut state = LibraryState::default();
        state.add_to_library("3");
        let before = state.clone();
        assert!(!state.toggle_wishlist("3"));
        assert_eq!(state, before);
    }

    #[test]
    fn toggles_flip_membership() {
        let mut state = LibraryState::default();
        state.add_to_library("1");
        state.toggle_favorite("1");
        state.toggle_favorite("1");
        assert!(!state.is_favorited("1"));

        state.toggle_wishlist("4");
        state.toggle_wishlist("4");
        assert!(!state.is_wishlisted("4"));
    }

    #[test]
    fn from_parts_normalises() {
        let state = LibraryState::from_parts(
            vec!["1".to_string(), "3".to_string()],
            vec!["1".to_string(), "2".to_string()],
            vec!["2".to_string(), "3".to_string()],
        );
        assert!(state.is_favorited("1"));
        assert!(!state.is_favorited("2"));
        assert!(state.is_wishlisted("2"));
        assert!(!state.is_wishlisted("3"));
        assert_invariants(&state);
    }

    #[test]
    fn invariants_hold_over_a_mixed_sequence() {
        let mut state = LibraryState::default();
        let ids = ["1", "2", "3", "4"];
        for (step, id) in ids.iter().cycle().take(40).enumerate() {
            match step % 5 {
                0 => {
                    state.toggle_wishlist(id);
                }
                1 => {
                    state.add_to_library(id);
                }
                2 => {
                    state.toggle_favorite(id);
                }
                3 => {
                    state.remove_from_library(id);
                }
                _ => {
                    state.toggle_favorite(id);
                    state.toggle_wishlist(id);
                }
            }
            assert_invariants(&state);
        }
    }

    #[test]
    fn manager_notifies_watchers_only_on_change() {
        let manager = LibraryManager::new(Arc::new(Alerts::default()));
        let mut rx = manager.subscribe();

        manager.toggle_favorite("1");
        assert!(!rx.has_changed().unwrap());

        manager.add_to_library("1");
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_owned("1"));

        manager.add_to_library("1");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn purchase_confirms_with_price() {
        let alerts = Arc::new(Alerts::default());
        let manager = LibraryManager::new(alerts.clone());
        manager.toggle_wishlist("2");
        let catalog = Catalog::bundled_sample();
        let story = catalog.get("2").unwrap().clone();

        manager.purchase(&story);

        assert!(manager.is_owned("2"));
        assert!(!manager.is_wishlisted("2"));
        let alerts = alerts.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Purchase Successful");
        assert!(alerts[0].message.contains(&story.price_label()));
    }

    #[test]
    fn resolved_views_follow_catalog_order() {
        let manager = LibraryManager::new(Arc::new(Alerts::default()));
        let catalog = Catalog::bundled_sample();
        manager.add_to_library("3");
        manager.add_to_library("1");
        manager.toggle_favorite("3");
        manager.toggle_wishlist("2");

        let owned: Vec<String> = manager
            .owned_stories(&catalog)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(owned, vec!["1", "3"]);
        assert_eq!(manager.favorite_stories(&catalog)[0].id, "3");
        assert_eq!(manager.wishlisted_stories(&catalog)[0].id, "2");
    }
}
