//! Library and player flows through the fully wired `AppState`.

use app_lib::adapters::{CollectingNotifier, InMemoryStore, SessionAuth};
use app_lib::config::Config;
use app_lib::state::AppState;
use std::sync::Arc;
use storytime_core::domain::User;
use storytime_core::playback::{PlayerState, PreviewSession, SeekDirection};

fn app() -> (AppState, CollectingNotifier) {
    let alerts = CollectingNotifier::new();
    let state = AppState::new(
        Arc::new(Config::default()),
        Arc::new(InMemoryStore::new()),
        Arc::new(SessionAuth::signed_in(User {
            user_id: "demo-user".to_string(),
            email: None,
        })),
        Arc::new(alerts.clone()),
    )
    .unwrap();
    (state, alerts)
}

#[test]
fn buying_a_wishlisted_story_moves_it_into_the_library() {
    let (app, alerts) = app();
    let story = app.catalog.get("2").unwrap().clone();

    app.library.toggle_wishlist(&story.id);
    assert!(app.library.is_wishlisted(&story.id));

    app.library.purchase(&story);

    assert!(app.library.is_owned(&story.id));
    assert!(!app.library.is_wishlisted(&story.id));
    assert!(!app.library.is_favorited(&story.id));
    assert_eq!(alerts.titles(), vec!["Purchase Successful"]);
    assert!(alerts.alerts()[0].message.contains("$3.99"));
}

#[test]
fn guarded_toggles_are_silent() {
    let (app, alerts) = app();
    app.library.add_to_library("1");
    let before = app.library.snapshot();

    app.library.toggle_favorite("3");
    app.library.toggle_wishlist("1");

    assert_eq!(app.library.snapshot(), before);
    assert!(alerts.alerts().is_empty());
}

#[test]
fn removing_a_favorite_story_clears_the_favorite() {
    let (app, _) = app();
    app.library.add_to_library("1");
    app.library.toggle_favorite("1");
    app.library.remove_from_library("1");

    assert!(!app.library.is_owned("1"));
    assert!(!app.library.is_favorited("1"));
    assert!(app.library.favorite_stories(&app.catalog).is_empty());
}

#[test]
fn mini_player_follows_the_full_player_scope() {
    let (app, _) = app();
    let first = app.catalog.get("1").unwrap().clone();
    let second = app.catalog.get("3").unwrap().clone();
    let mut updates = app.player.subscribe();

    {
        let _screen = app.player.present(Some(first));
        app.player.play();
        app.player.tick();
        app.player.seek(SeekDirection::Forward);
        assert!(!app.player.session().shows_mini_player());
    }
    assert!(updates.has_changed().unwrap());
    let session = updates.borrow_and_update().clone();
    assert_eq!(session.state(), PlayerState::Minimized);
    assert!(session.shows_mini_player());
    assert_eq!(session.current_time, 16);
    assert!(session.is_playing);

    // Tapping the mini player brings the same session back.
    {
        let _screen = app.player.present(None);
        assert_eq!(app.player.session().current_time, 16);
        assert_eq!(app.player.state(), PlayerState::Expanded);
    }

    app.player.open(second);
    let session = app.player.session();
    assert_eq!(session.current_story.unwrap().id, "3");
    assert_eq!(session.current_time, 0);

    app.player.close();
    let session = app.player.session();
    assert!(session.current_story.is_none());
    assert!(!session.is_playing);
    assert_eq!(session.current_time, 0);
}

#[test]
fn preview_leads_into_wishlist_and_purchase() {
    let (app, alerts) = app();
    let story = app.catalog.get("4").unwrap().clone();
    let mut preview = PreviewSession::new();

    preview.play();
    for _ in 0..30 {
        preview.tick();
    }
    app.library.toggle_wishlist(&story.id);
    assert!(app.library.is_wishlisted(&story.id));
    assert_eq!(preview.label(), "3s / 10s");

    // Buying closes the preview.
    app.library.purchase(&story);
    preview.stop();

    assert!(!preview.is_playing());
    assert!(app.library.is_owned(&story.id));
    assert!(!app.library.is_wishlisted(&story.id));
    assert_eq!(alerts.titles(), vec!["Purchase Successful"]);
    assert!(app.player.current_story().is_none());
}
