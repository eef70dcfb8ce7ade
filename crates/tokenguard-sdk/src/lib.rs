//! # tokenguard SDK
//!
//! Client-side HTTP pipeline that keeps one session authenticated across many
//! concurrent requests: it stamps every call with the stored bearer
//! credential, refreshes the credential once when any number of calls are
//! rejected with 401, replays each rejected call with the new credential, and
//! ends the session cleanly when the refresh itself fails.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types
pub use auth::{
    AuthError, Credential, CredentialStore, FileCredentialStore, HttpRefresher,
    KeyringCredentialStore, MemoryCredentialStore, Refresher, SessionEndReason, SessionEvent,
};
pub use client::{AuthClient, ClientBuilder};
pub use config::{ClientConfig, RoutesConfig, StoreConfig, StoreKind};
pub use error::{ApiError, ErrorResponse, Result};
pub use pipeline::{RefreshCoordinator, RetryableRequest};
