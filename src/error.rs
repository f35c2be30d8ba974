//! Error classification shared by the crate's error enums.

/// Grepable error codes plus a retry hint, attached to every error enum so
/// logs and hosting layers can branch without matching on message text.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Invalid configuration value read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {var}: {reason}")]
pub struct ConfigError {
    pub var: String,
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(var: &str, reason: impl Into<String>) -> Self {
        Self { var: var.to_owned(), reason: reason.into() }
    }
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG"
    }
}
