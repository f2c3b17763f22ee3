//! services/app/src/adapters/auth.rs
//!
//! A session-backed implementation of the `AuthSession` port. The identity
//! provider itself lives outside this app; this adapter only remembers who
//! is signed in and lets observers follow sign-in changes.

use storytime_core::domain::User;
use storytime_core::ports::AuthSession;
use tokio::sync::watch;
use tracing::info;

pub struct SessionAuth {
    user: watch::Sender<Option<User>>,
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl SessionAuth {
    pub fn signed_out() -> Self {
        let (user, _) = watch::channel(None);
        Self { user }
    }

    pub fn signed_in(user: User) -> Self {
        let (user, _) = watch::channel(Some(user));
        Self { user }
    }

    pub fn sign_in(&self, user: User) {
        info!(user_id = %user.user_id, "Signed in.");
        self.user.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if self.user.send_replace(None).is_some() {
            info!("Signed out.");
        }
    }
}

impl AuthSession for SessionAuth {
    fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    fn changes(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }
}
