//! Error types for the tokenguard CLI

use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file issues
    #[error("Configuration error: {0}")]
    Config(#[from] tokenguard_common::ConfigurationError),

    /// Request pipeline errors
    #[error(transparent)]
    Api(#[from] tokenguard_sdk::ApiError),

    /// Credential store errors
    #[error(transparent)]
    Auth(#[from] tokenguard_sdk::AuthError),

    /// Bad command-line input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
