//! Configuration error type

use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration file could not be read
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// The layered sources could not be merged into the target type
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// A value parsed but failed validation
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigurationError {
    /// Shorthand for an [`ConfigurationError::InvalidValue`]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigurationError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError {
            details: err.to_string(),
        }
    }
}
