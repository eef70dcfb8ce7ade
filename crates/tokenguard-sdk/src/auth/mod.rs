//! Authentication module for the tokenguard SDK
//!
//! - Credential type and session events
//! - Credential storage backends (memory, file, OS keyring)
//! - The refresh call used by the pipeline's coordinator

pub mod refresh;
pub mod token_store;
pub mod types;

// Re-export commonly used types
pub use refresh::{HttpRefresher, Refresher};
pub use token_store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use types::{AuthError, AuthResult, Credential, SessionEndReason, SessionEvent};
