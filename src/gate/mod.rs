//! Route gate: edge admission control for page navigations.
//!
//! DESIGN
//! ======
//! The gate only looks at the path and whether the credential cookie is
//! present. It never reads the cookie value and never calls the network, so
//! a decision is a handful of prefix checks. A stale decision is corrected on
//! the next navigation once the cookie changes.
//!
//! Classification is first-match: `/auth/...` is `Public`, yet the
//! auth-restricted check still applies to it, which is what sends a signed-in
//! user away from the login page.

pub mod middleware;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::borrow::Cow;

use crate::config::env_path;
use crate::error::ConfigError;

pub use middleware::route_gate;

pub const DEFAULT_AUTH_PATH: &str = "/auth";
pub const DEFAULT_ROOT_PATH: &str = "/";
pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_ASSET_PREFIX: &str = "/_next";
pub const DEFAULT_COOKIE_NAME: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    AuthRestricted,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    RedirectTo(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub auth_path: String,
    pub root_path: String,
    pub api_prefix: String,
    /// Framework asset prefixes treated as public.
    pub asset_prefixes: Vec<String>,
    /// Paths the gate never sees (matcher exclusions).
    pub excluded_prefixes: Vec<String>,
    pub cookie_name: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auth_path: DEFAULT_AUTH_PATH.to_owned(),
            root_path: DEFAULT_ROOT_PATH.to_owned(),
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            asset_prefixes: vec![DEFAULT_ASSET_PREFIX.to_owned()],
            excluded_prefixes: vec![
                DEFAULT_API_PREFIX.to_owned(),
                "/_next/static".to_owned(),
                "/_next/image".to_owned(),
                "/favicon.ico".to_owned(),
            ],
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
        }
    }
}

impl GateConfig {
    /// Build from `GATE_AUTH_PATH`, `GATE_API_PREFIX`, `GATE_COOKIE_NAME`,
    /// falling back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a path does not start with `/` or the cookie name is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_path = env_path("GATE_AUTH_PATH", DEFAULT_AUTH_PATH)?;
        let api_prefix = env_path("GATE_API_PREFIX", DEFAULT_API_PREFIX)?;
        let cookie_name = std::env::var("GATE_COOKIE_NAME")
            .map_or_else(|_| DEFAULT_COOKIE_NAME.to_owned(), |v| v.trim().to_owned());
        if cookie_name.is_empty() {
            return Err(ConfigError::new("GATE_COOKIE_NAME", "must not be empty"));
        }

        let excluded_prefixes = vec![
            api_prefix.clone(),
            "/_next/static".to_owned(),
            "/_next/image".to_owned(),
            "/favicon.ico".to_owned(),
        ];

        Ok(Self { auth_path, api_prefix, cookie_name, excluded_prefixes, ..Self::default() })
    }
}

#[derive(Debug, Clone)]
pub struct RouteGate {
    config: GateConfig,
}

impl RouteGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// True for paths the edge matcher skips entirely.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.config
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let c = &self.config;
        path.starts_with(c.auth_path.as_str())
            || path == c.root_path
            || c.asset_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || path.starts_with(c.api_prefix.as_str())
            || path.contains('.')
    }

    #[must_use]
    pub fn is_auth_restricted(&self, path: &str) -> bool {
        path.starts_with(self.config.auth_path.as_str())
    }

    /// First-match classification.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_public(path) {
            RouteClass::Public
        } else if self.is_auth_restricted(path) {
            RouteClass::AuthRestricted
        } else {
            RouteClass::Protected
        }
    }

    #[must_use]
    pub fn decide(&self, path: &str, has_credential: bool) -> GateDecision {
        if has_credential && self.is_auth_restricted(path) {
            return GateDecision::RedirectTo(self.config.root_path.clone());
        }
        if !has_credential && !self.is_public(path) {
            return GateDecision::RedirectTo(self.login_redirect(path));
        }
        GateDecision::Proceed
    }

    fn login_redirect(&self, from: &str) -> String {
        format!("{}?from={}", self.config.auth_path, escape_query_value(from))
    }
}

/// Escape only the characters that would end or corrupt a query value.
/// Slashes stay literal so `from=/dashboard` reads naturally.
fn escape_query_value(value: &str) -> Cow<'_, str> {
    if !value.contains(&['%', '&', '#', '+'][..]) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '#' => out.push_str("%23"),
            '+' => out.push_str("%2B"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
