//! Command-line client for the Lockbox vault.
//!
//! Manages entries in the local vault and syncs them with a Lockbox server.

pub mod commands;
pub mod config;

pub use config::{ClientConfig, ConfigError, Overrides};
