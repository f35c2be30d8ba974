use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::*;
use crate::net::config::{LOGOUT_PATH, PROBE_PATH, REFRESH_PATH};
use crate::net::{ApiRequest, ApiResponse, ClientConfig, Transport};

// =============================================================================
// SCRIPTED TRANSPORT
// =============================================================================

type Reply = Result<ApiResponse, ClientError>;

/// Replies per path in order; an exhausted script answers 404.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    hang_probe: bool,
}

impl ScriptedTransport {
    fn reply(self, path: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_default()
            .push_back(reply);
        self
    }

    fn hang_probe(mut self) -> Self {
        self.hang_probe = true;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.calls.lock().unwrap().push(request.path.clone());
        if self.hang_probe && request.path == PROBE_PATH {
            std::future::pending::<()>().await;
        }
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(ApiResponse::new(404, "")))
    }
}

fn user_json() -> String {
    serde_json::json!({
        "id": 42,
        "username": "ada",
        "email": "ada@example.com",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "date_joined": "2024-05-01T09:30:00Z"
    })
    .to_string()
}

fn store_over(transport: ScriptedTransport) -> (SessionStore, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let client = Arc::new(ResilientClient::new(dyn_transport, ClientConfig::default()));
    (SessionStore::new(client), transport)
}

fn assert_invariant(session: &Session) {
    assert_eq!(session.is_authenticated(), session.user().is_some(), "invariant broken: {session:?}");
}

// =============================================================================
// INITIAL STATE
// =============================================================================

#[test]
fn starts_unauthenticated_and_loading() {
    let (store, transport) = store_over(ScriptedTransport::default());
    let session = store.snapshot();
    assert_eq!(session.status(), AuthStatus::Unauthenticated);
    assert!(session.user().is_none());
    assert!(session.is_loading());
    assert!(transport.calls().is_empty());
}

// =============================================================================
// check_auth_status
// =============================================================================

#[tokio::test]
async fn valid_probe_authenticates() {
    let (store, _) = store_over(ScriptedTransport::default().reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json()))));
    store.check_auth_status().await;

    assert!(store.is_authenticated());
    assert!(!store.is_loading());
    let user = store.user().unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(user.id, 42);
    assert_invariant(&store.snapshot());
}

#[tokio::test]
async fn connect_runs_initial_probe() {
    let transport = Arc::new(ScriptedTransport::default().reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json()))));
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let client = Arc::new(ResilientClient::new(dyn_transport, ClientConfig::default()));

    let store = SessionStore::connect(client).await;
    assert!(store.is_authenticated());
    assert_eq!(transport.calls(), vec![PROBE_PATH.to_owned()]);
}

#[tokio::test]
async fn failed_probe_variants_leave_signed_out() {
    let failures: Vec<Reply> = vec![
        Ok(ApiResponse::new(500, "oops")),
        Ok(ApiResponse::new(403, "")),
        Ok(ApiResponse::new(200, "")),
        Ok(ApiResponse::new(200, "null")),
        Ok(ApiResponse::new(200, "{}")),
        Err(ClientError::Transport("dns failure".into())),
    ];
    for failure in failures {
        let label = format!("{failure:?}");
        let (store, _) = store_over(ScriptedTransport::default().reply(PROBE_PATH, failure));
        store.check_auth_status().await;

        let session = store.snapshot();
        assert!(!session.is_authenticated(), "{label}");
        assert!(session.user().is_none(), "{label}");
        assert!(!session.is_loading(), "{label}");
        assert_eq!(session.status(), AuthStatus::Unauthenticated, "{label}");
    }
}

#[tokio::test]
async fn probe_recovers_through_refresh() {
    let (store, transport) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(401, "")))
            .reply(REFRESH_PATH, Ok(ApiResponse::new(200, "")))
            .reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json()))),
    );
    store.check_auth_status().await;

    assert!(store.is_authenticated());
    assert_eq!(transport.calls(), vec![PROBE_PATH, REFRESH_PATH, PROBE_PATH]);
}

#[tokio::test]
async fn probe_with_failed_refresh_signs_out() {
    let (store, _) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(401, "")))
            .reply(REFRESH_PATH, Ok(ApiResponse::new(401, ""))),
    );
    store.check_auth_status().await;

    assert!(!store.is_authenticated());
    assert!(!store.is_loading());
}

#[tokio::test]
async fn recheck_failure_replaces_previous_user() {
    let (store, _) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json())))
            .reply(PROBE_PATH, Ok(ApiResponse::new(500, ""))),
    );
    store.check_auth_status().await;
    assert!(store.is_authenticated());

    store.check_auth_status().await;
    assert!(!store.is_authenticated());
    assert!(store.user().is_none());
    assert_invariant(&store.snapshot());
}

#[tokio::test]
async fn cancelled_probe_still_clears_loading() {
    let (store, _) = store_over(ScriptedTransport::default().hang_probe());
    let timed_out = tokio::time::timeout(Duration::from_millis(20), store.check_auth_status()).await;
    assert!(timed_out.is_err());

    let session = store.snapshot();
    assert!(!session.is_loading());
    assert_eq!(session.status(), AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn subscribers_see_settled_state() {
    let (store, _) = store_over(ScriptedTransport::default().reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json()))));
    let mut rx = store.subscribe();

    store.check_auth_status().await;
    assert!(rx.has_changed().unwrap());
    let session = rx.borrow_and_update().clone();
    assert!(session.is_authenticated());
    assert!(!session.is_loading());
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_clears_after_success() {
    let (store, transport) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json())))
            .reply(LOGOUT_PATH, Ok(ApiResponse::new(204, ""))),
    );
    store.check_auth_status().await;
    store.logout().await;

    assert!(!store.is_authenticated());
    assert!(store.user().is_none());
    assert_eq!(transport.calls().last().map(String::as_str), Some(LOGOUT_PATH));
}

#[tokio::test]
async fn logout_clears_even_when_server_call_fails() {
    let (store, _) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json())))
            .reply(LOGOUT_PATH, Err(ClientError::Transport("network unreachable".into()))),
    );
    store.check_auth_status().await;
    assert!(store.is_authenticated());

    store.logout().await;
    assert!(!store.is_authenticated());
    assert!(store.user().is_none());
    assert_eq!(store.snapshot().status(), AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn logout_clears_when_server_rejects() {
    let (store, _) = store_over(
        ScriptedTransport::default()
            .reply(PROBE_PATH, Ok(ApiResponse::new(200, user_json())))
            .reply(LOGOUT_PATH, Ok(ApiResponse::new(500, ""))),
    );
    store.check_auth_status().await;
    store.logout().await;
    assert!(!store.is_authenticated());
}
