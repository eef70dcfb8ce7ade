//! # tokenguard CLI
//!
//! Drives the tokenguard request pipeline from a shell: authenticated
//! requests, concurrent bursts to observe single-flight refresh, credential
//! store maintenance and logout.

pub mod cli;
pub mod error;

pub use cli::*;
pub use error::*;
