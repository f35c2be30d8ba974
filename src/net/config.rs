//! Request-client configuration parsed from environment variables.

use std::time::Duration;

use crate::config::{env_bool, env_parse, env_path};
use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

pub const PROBE_PATH: &str = "/accounts/me/";
pub const REFRESH_PATH: &str = "/accounts/token/refresh/";
pub const LOGOUT_PATH: &str = "/accounts/logout/";
pub const LOGIN_PATH: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound on the shared refresh call; expiry counts as a failed refresh.
    pub refresh_timeout: Duration,
    /// When false every 401 is passed straight through as `AuthExpired`.
    pub refresh_enabled: bool,
    pub probe_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    /// Carried by the invalidation notification as the redirect target.
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
            refresh_enabled: true,
            probe_path: PROBE_PATH.to_owned(),
            refresh_path: REFRESH_PATH.to_owned(),
            logout_path: LOGOUT_PATH.to_owned(),
            login_path: LOGIN_PATH.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Build from environment variables.
    ///
    /// Optional:
    /// - `API_BASE_URL`: default `http://localhost:8000/api`
    /// - `API_REQUEST_TIMEOUT_SECS`: default 30
    /// - `API_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_REFRESH_TIMEOUT_SECS`: default 15
    /// - `SESSION_REFRESH_ENABLED`: default true
    /// - `SESSION_LOGIN_PATH`: default `/auth`
    ///
    /// # Errors
    ///
    /// Returns an error if `API_BASE_URL` is not an http(s) URL or the login
    /// path is not absolute.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned())
            .trim()
            .trim_end_matches('/')
            .to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::new("API_BASE_URL", format!("expected an http(s) URL, got {base_url:?}")));
        }

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(env_parse("API_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse("API_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            refresh_timeout: Duration::from_secs(env_parse(
                "SESSION_REFRESH_TIMEOUT_SECS",
                DEFAULT_REFRESH_TIMEOUT_SECS,
            )),
            refresh_enabled: env_bool("SESSION_REFRESH_ENABLED").unwrap_or(true),
            login_path: env_path("SESSION_LOGIN_PATH", LOGIN_PATH)?,
            ..Self::default()
        })
    }
}
