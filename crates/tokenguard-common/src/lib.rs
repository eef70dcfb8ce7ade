//! # tokenguard-common
//!
//! Pieces shared by every tokenguard crate:
//! - Layered configuration loading (defaults, TOML file, environment)
//! - Configuration error type
//! - Unified logging initialization for binaries

pub mod config;
pub mod error;
pub mod logging;

pub use config::ConfigLoader;
pub use error::ConfigurationError;
