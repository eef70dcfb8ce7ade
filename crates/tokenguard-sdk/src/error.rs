//! Error types for the tokenguard SDK

use crate::auth::AuthError;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced to callers of [`crate::AuthClient`]
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure, no response was received
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The credential could not be refreshed; the session is over
    #[error("Session expired: {0}")]
    SessionExpired(AuthError),

    /// Every refresh this request waited on was abandoned by its leader;
    /// the stored credential is unchanged and the session is still live
    #[error("Credential refresh was interrupted")]
    RefreshInterrupted,

    /// Credential storage failure outside the refresh path
    #[error("Credential storage error: {0}")]
    Storage(AuthError),

    /// Server still rejects the credential (after the one permitted retry,
    /// or on an auth route)
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Authorization error
    #[error("Authorization error: {message}")]
    Authorization { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Not found
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Bad request with message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Request could not be built
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Any other unsuccessful status
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Map a failed refresh to the error the waiting request sees
    pub(crate) fn from_refresh_failure(error: AuthError) -> Self {
        match error {
            AuthError::RefreshAborted => ApiError::RefreshInterrupted,
            other => ApiError::SessionExpired(other),
        }
    }

    /// Whether the application should treat this as "logged out"
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

/// Error body commonly returned by REST backends
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "error", alias = "detail")]
    pub message: String,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
