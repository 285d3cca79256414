//! tungo-config - configuration loading, default-filling, and validation
//!
//! Parses a TOML file into a [`ClientConfig`] or [`ServerConfig`], applying
//! every clamp spec.md §6 names and loading the configured key material
//! from disk.

mod config;
mod error;
mod keys;

pub use config::{ClientConfig, ServerConfig, TransportKind};
pub use error::ConfigError;
