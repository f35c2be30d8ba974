//! Session belief store: the application's current answer to "who is
//! logged in".
//!
//! SYSTEM CONTEXT
//! ==============
//! Consumers read snapshots or subscribe to changes; they can only ask the
//! store to re-probe or to log out. The identity probe goes through the
//! shared [`ResilientClient`], so an expired credential is refreshed before
//! the store ever sees a failure.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns an error. Every failed or unusable probe resolves to
//! the unauthenticated state and is only logged.

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::net::{ClientError, ResilientClient, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// A snapshot of the store's belief.
///
/// `status == Authenticated` exactly when `user` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    user: Option<User>,
    status: AuthStatus,
    loading: bool,
}

impl Session {
    fn initial() -> Self {
        Self { user: None, status: AuthStatus::Unauthenticated, loading: true }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn begin_probe(&mut self) {
        self.loading = true;
        if self.user.is_none() {
            self.status = AuthStatus::Authenticating;
        }
    }

    fn finish_probe(&mut self) {
        self.loading = false;
        if self.status == AuthStatus::Authenticating {
            self.status = AuthStatus::Unauthenticated;
        }
    }

    fn authenticate(&mut self, user: User) {
        self.user = Some(user);
        self.status = AuthStatus::Authenticated;
    }

    fn clear(&mut self) {
        self.user = None;
        self.status = AuthStatus::Unauthenticated;
    }
}

/// Applies a final update when dropped, so cleanup also runs when the
/// owning future is cancelled.
struct Finally<'a> {
    state: &'a watch::Sender<Session>,
    apply: fn(&mut Session),
}

impl Drop for Finally<'_> {
    fn drop(&mut self) {
        self.state.send_modify(self.apply);
    }
}

pub struct SessionStore {
    client: Arc<ResilientClient>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    /// Store in its initial state (no user, loading) without probing.
    #[must_use]
    pub fn new(client: Arc<ResilientClient>) -> Self {
        let (state, _) = watch::channel(Session::initial());
        Self { client, state }
    }

    /// Build the store and run the initial identity probe.
    pub async fn connect(client: Arc<ResilientClient>) -> Self {
        let store = Self::new(client);
        store.check_auth_status().await;
        store
    }

    /// The client consumers should use for their own calls.
    #[must_use]
    pub fn client(&self) -> &Arc<ResilientClient> {
        &self.client
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Notified on every change of belief or loading flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Probe the server and replace the belief with the result.
    ///
    /// Concurrent calls are not deduplicated; each runs its own probe.
    pub async fn check_auth_status(&self) {
        self.state.send_modify(Session::begin_probe);
        let _loading = Finally { state: &self.state, apply: Session::finish_probe };

        match self.probe().await {
            Ok(user) => {
                tracing::debug!(user_id = user.id, "identity probe succeeded");
                self.state.send_modify(|s| s.authenticate(user));
            }
            Err(e) => {
                tracing::debug!(error = %e, "identity probe failed; treating as signed out");
                self.state.send_modify(Session::clear);
            }
        }
    }

    /// Ask the server to end the session, then forget the user whatever the
    /// server said.
    pub async fn logout(&self) {
        let _clear = Finally { state: &self.state, apply: Session::clear };

        let path = self.client.config().logout_path.clone();
        match self.client.post(&path).await {
            Ok(response) if response.is_success() => tracing::info!("logged out"),
            Ok(response) => tracing::warn!(status = response.status, "logout rejected by server; clearing session"),
            Err(e) => tracing::warn!(error = %e, "logout request failed; clearing session"),
        }
    }

    async fn probe(&self) -> Result<User, ClientError> {
        let path = self.client.config().probe_path.clone();
        let response = self.client.get(&path).await?.error_for_status()?;
        response
            .json::<User>()
            .map_err(|e| ClientError::ProbeInvalid(e.to_string()))
    }
}
