//! Identity collaborator
//!
//! Credentials are verified elsewhere. The pantry only asks "who is signed in
//! right now?" and passes the answer explicitly into every operation.

use tokio::sync::watch;

use crate::error::{PantryError, Result};
use crate::models::OwnerId;

pub trait Identity: Send + Sync {
    /// The signed-in user, if any
    fn current_user_id(&self) -> Option<OwnerId>;

    /// Notified with the new owner id (or `None`) on every sign-in / sign-out.
    /// Dropping the receiver unsubscribes.
    fn on_auth_change(&self) -> watch::Receiver<Option<OwnerId>>;
}

/// Resolve the current owner or fail with `NotAuthenticated`
pub fn require_owner(identity: &dyn Identity) -> Result<OwnerId> {
    identity
        .current_user_id()
        .ok_or(PantryError::NotAuthenticated)
}

/// In-process session fed by whatever authenticated the user
/// (a CLI flag, an environment variable, a fronting proxy)
pub struct SessionIdentity {
    tx: watch::Sender<Option<OwnerId>>,
}

impl SessionIdentity {
    pub fn new(initial: Option<OwnerId>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn sign_in(&self, owner: OwnerId) {
        log::info!("Signed in as {}", owner);
        self.tx.send_replace(Some(owner));
    }

}

impl Identity for SessionIdentity {
    fn current_user_id(&self) -> Option<OwnerId> {
        self.tx.borrow().clone()
    }

    fn on_auth_change(&self) -> watch::Receiver<Option<OwnerId>> {
        self.tx.subscribe()
    }
}
