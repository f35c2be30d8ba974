//! Axum middleware applying the route gate to every matched navigation.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use super::{GateDecision, RouteGate};

/// Install with `axum::middleware::from_fn_with_state(gate, route_gate)`.
///
/// Excluded paths bypass the gate. An empty cookie value counts as absent.
pub async fn route_gate(State(gate): State<Arc<RouteGate>>, jar: CookieJar, request: Request, next: Next) -> Response {
    let decision = {
        let path = request.uri().path();
        if gate.is_excluded(path) {
            GateDecision::Proceed
        } else {
            let has_credential = jar
                .get(gate.cookie_name())
                .is_some_and(|cookie| !cookie.value().is_empty());
            let decision = gate.decide(path, has_credential);
            if let GateDecision::RedirectTo(target) = &decision {
                tracing::debug!(%path, %target, has_credential, "route gate redirect");
            }
            decision
        }
    };

    match decision {
        GateDecision::Proceed => next.run(request).await,
        GateDecision::RedirectTo(target) => Redirect::temporary(&target).into_response(),
    }
}

#[cfg(test)]
#[path = "middleware_test.rs"]
mod tests;
