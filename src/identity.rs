//! The signed-in member, handed to the core as a read-only context value.

use tokio::sync::watch;

use crate::models::{AuthUser, UserId};

/// Owned by the auth layer; the only writer of the current identity.
pub struct AuthState {
    tx: watch::Sender<Option<AuthUser>>,
}

impl AuthState {
    pub fn new(initial: Option<AuthUser>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn sign_in(&self, user: AuthUser) {
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    pub fn context(&self) -> AuthContext {
        AuthContext {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Read side of [`AuthState`]. Cheap to clone; components never mutate it.
#[derive(Clone)]
pub struct AuthContext {
    rx: watch::Receiver<Option<AuthUser>>,
}

impl AuthContext {
    pub fn current(&self) -> Option<AuthUser> {
        self.rx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.rx.borrow().as_ref().map(|user| user.id.clone())
    }

    /// Current identity, marking it as seen so `changed()` waits for the
    /// next update.
    pub fn current_and_mark_seen(&mut self) -> Option<AuthUser> {
        self.rx.borrow_and_update().clone()
    }

    /// Resolves when the identity changes. Errors once the auth layer is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}
