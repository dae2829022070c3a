//! Core error types

use thiserror::Error;

/// Core error type for configuration and startup failures.
///
/// Everything here is fatal at construction time: a simulation is never
/// built from a configuration that produced one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration field failed validation
    #[error("Invalid configuration '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
