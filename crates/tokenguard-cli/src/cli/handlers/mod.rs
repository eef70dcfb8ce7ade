//! Command handlers for the tokenguard CLI

pub mod config;
pub mod request;
pub mod session;
pub mod token;
