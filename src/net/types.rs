//! Request/response types and the client error taxonomy.
//!
//! DESIGN
//! ======
//! `ApiRequest` is owned and `Clone` so the resilient client can replay it
//! after a refresh without asking the caller to rebuild it. Responses are
//! buffered (`status` + `body`) since every caller in this layer either
//! decodes JSON or checks the status.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Status code the server uses for an expired (but refreshable) credential.
pub const STATUS_UNAUTHORIZED: u16 = 401;

// =============================================================================
// ERROR
// =============================================================================

/// Errors surfaced by the request client and its transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Network-level failure; not auth related, passed through untouched.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the credential and no further recovery is allowed.
    #[error("authentication expired: status {status}")]
    AuthExpired { status: u16, body: String },

    /// The shared refresh call failed; the session is no longer usable.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// The identity probe answered 200 but carried no usable user.
    #[error("identity probe returned no usable payload: {0}")]
    ProbeInvalid(String),

    /// A call that requires success got another status.
    #[error("unexpected response status {status}")]
    Status { status: u16, body: String },

    /// A response body could not be deserialized.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::AuthExpired { .. } => "E_AUTH_EXPIRED",
            Self::RefreshFailed(_) => "E_REFRESH_FAILED",
            Self::ProbeInvalid(_) => "E_PROBE_INVALID",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound API call, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST` with no body (refresh, logout).
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    #[must_use]
    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    #[must_use]
    pub fn put_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    #[must_use]
    pub fn patch_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Patch, path).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Fail with [`ClientError::Status`] unless the status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] carrying the status and body.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Status { status: self.status, body: self.body })
        }
    }
}

// =============================================================================
// USER
// =============================================================================

/// Identity returned by the probe endpoint. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub date_joined: String,
}
