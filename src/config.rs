//! Environment-driven configuration.
//!
//! Every setting has a typed default so the edge server starts with an empty
//! environment; only malformed values are rejected.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::gate::GateConfig;
use crate::net::ClientConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "./site";

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Read an env var that must be an absolute URL path (`/...`).
pub(crate) fn env_path(key: &str, default: &str) -> Result<String, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default.to_owned());
    };
    let value = raw.trim();
    if !value.starts_with('/') {
        return Err(ConfigError::new(key, format!("expected a path starting with '/', got {value:?}")));
    }
    Ok(value.to_owned())
}

/// Top-level settings for the edge binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub site_dir: PathBuf,
    pub gate: GateConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    /// Build from `PORT`, `SITE_DIR`, plus the gate and client variables.
    ///
    /// # Errors
    ///
    /// Returns the first malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            site_dir: std::env::var("SITE_DIR").map_or_else(|_| PathBuf::from(DEFAULT_SITE_DIR), PathBuf::from),
            gate: GateConfig::from_env()?,
            client: ClientConfig::from_env()?,
        })
    }
}
