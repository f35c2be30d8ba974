//! Resilient request client.
//!
//! ARCHITECTURE
//! ============
//! Every outbound call goes through [`ResilientClient::send`]. A 401 on a
//! first attempt joins the client's [`RefreshCoordinator`]: one caller runs
//! the refresh, the rest wait on it, and each then replays its own request
//! once. A 401 on a replay is terminal.
//!
//! ERROR HANDLING
//! ==============
//! Transport errors and terminal 401s reach the caller unchanged. A failed
//! refresh rejects the leader and every waiter with the same
//! `RefreshFailed` and publishes one [`SessionInvalidated`] so the hosting
//! layer can send the user to the login page.

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use super::config::ClientConfig;
use super::refresh::{Phase, RefreshCoordinator, RefreshOutcome, Ticket};
use super::transport::{HttpTransport, Transport};
use super::types::{ApiRequest, ApiResponse, ClientError};

const INVALIDATION_CHANNEL_CAPACITY: usize = 16;

/// Published once per failed refresh: no call can succeed until the user
/// signs in again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    /// Where the hosting layer should navigate.
    pub login_path: String,
    pub reason: String,
}

/// A call in flight. `retried` caps replays at one.
#[derive(Debug)]
struct RequestAttempt {
    id: Uuid,
    request: ApiRequest,
    retried: bool,
}

impl RequestAttempt {
    fn new(request: ApiRequest) -> Self {
        Self { id: Uuid::new_v4(), request, retried: false }
    }
}

pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    invalidations: broadcast::Sender<SessionInvalidated>,
    config: ClientConfig,
}

impl ResilientClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CHANNEL_CAPACITY);
        Self { transport, coordinator: RefreshCoordinator::new(), invalidations, config }
    }

    /// Build over an [`HttpTransport`] configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receive a [`SessionInvalidated`] each time a refresh fails.
    #[must_use]
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<SessionInvalidated> {
        self.invalidations.subscribe()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.coordinator.phase() == Phase::Refreshing
    }

    /// Callers currently parked behind the in-flight refresh.
    #[must_use]
    pub fn pending_refresh_waiters(&self) -> usize {
        self.coordinator.pending()
    }

    /// Send a request, recovering once from an expired credential.
    ///
    /// Any non-401 response is returned as received, whatever its status.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] from the transport, unchanged.
    /// - [`ClientError::AuthExpired`] for a 401 that may not be recovered
    ///   (already replayed, or refresh disabled).
    /// - [`ClientError::RefreshFailed`] when the shared refresh failed.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let attempt = RequestAttempt::new(request);
        let span = tracing::debug_span!(
            "api_request",
            request_id = %attempt.id,
            method = %attempt.request.method,
            path = %attempt.request.path,
        );
        self.send_attempt(attempt).instrument(span).await
    }

    /// `GET` through [`Self::send`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`].
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    /// Body-less `POST` through [`Self::send`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`].
    pub async fn post(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::post(path)).await
    }

    async fn send_attempt(&self, mut attempt: RequestAttempt) -> Result<ApiResponse, ClientError> {
        loop {
            let response = self.transport.execute(&attempt.request).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }
            if attempt.retried || !self.config.refresh_enabled {
                tracing::debug!(retried = attempt.retried, "401 passed through");
                return Err(ClientError::AuthExpired { status: response.status, body: response.body });
            }

            attempt.retried = true;
            self.recover().await?;
            tracing::debug!("replaying after refresh");
        }
    }

    /// Join the in-flight refresh or start one.
    async fn recover(&self) -> RefreshOutcome {
        match self.coordinator.join() {
            Ticket::Leader(guard) => {
                let outcome = self.refresh().await;
                let waiters = guard.settle(&outcome);
                match &outcome {
                    Ok(()) => tracing::info!(waiters, "session refreshed"),
                    Err(e) => {
                        tracing::warn!(error = %e, waiters, "session refresh failed; invalidating session");
                        self.invalidate(e);
                    }
                }
                outcome
            }
            Ticket::Waiter(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::RefreshFailed("refresh abandoned".into()))),
        }
    }

    /// The one refresh call. Goes straight to the transport so a 401 here
    /// can never recurse into another refresh.
    async fn refresh(&self) -> RefreshOutcome {
        let request = ApiRequest::post(self.config.refresh_path.as_str());
        let timeout = self.config.refresh_timeout;
        match tokio::time::timeout(timeout, self.transport.execute(&request)).await {
            Err(_) => Err(ClientError::RefreshFailed(format!("timed out after {}ms", timeout.as_millis()))),
            Ok(Err(e)) => Err(ClientError::RefreshFailed(e.to_string())),
            Ok(Ok(response)) if response.is_success() => Ok(()),
            Ok(Ok(response)) => Err(ClientError::RefreshFailed(format!(
                "refresh endpoint returned status {}",
                response.status
            ))),
        }
    }

    fn invalidate(&self, error: &ClientError) {
        let event = SessionInvalidated { login_path: self.config.login_path.clone(), reason: error.to_string() };
        // No subscribers is fine: nobody is hosting a redirect.
        let _ = self.invalidations.send(event);
    }
}
