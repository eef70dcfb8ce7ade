//! Authentication-related types
//!
//! The credential itself, the error type shared by stores and refreshers,
//! and the session events broadcast to the application.

use etcetera::{choose_base_strategy, BaseStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Opaque bearer credential.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header for this credential
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Short form safe for display, e.g. `tok_…(12)`
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…({})", self.0.len())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Authentication errors.
///
/// Cloneable so a single refresh failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Refresh endpoint answered with a non-success status
    #[error("Credential refresh rejected with status {status}: {message}")]
    RefreshRejected { status: u16, message: String },

    /// Refresh call did not settle in time
    #[error("Credential refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    /// The task leading the refresh went away before it settled
    #[error("Credential refresh aborted before completion")]
    RefreshAborted,

    /// Transport failure while talking to the refresh or logout route
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Refresh succeeded but the body carried no usable credential
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// Credential store failure
    #[error("Credential storage error: {0}")]
    StorageError(String),
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The refresh call failed; the credential has been cleared
    RefreshFailed(AuthError),
    /// `logout` was called
    LoggedOut,
}

/// Session lifecycle notifications for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new credential was obtained and stored
    Refreshed,
    /// The session is over; the application should clear its own state and
    /// send the user back to a login surface
    Ended { reason: SessionEndReason },
}

/// Default data directory for persisted credentials
/// (e.g. `~/.local/share/tokenguard` on Linux)
pub fn get_sdk_data_dir() -> AuthResult<PathBuf> {
    let strategy = choose_base_strategy().map_err(|e| {
        AuthError::StorageError(format!("Failed to determine base directories: {e}"))
    })?;

    Ok(strategy.data_dir().join("tokenguard"))
}
