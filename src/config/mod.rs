//! Configuration management for dispatchbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use dispatchbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("User agent: {}", config.transport.user_agent);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `DISPATCHBOX__<section>__<key>`
//!
//! Examples:
//! - `DISPATCHBOX__TRANSPORT__REQUEST_TIMEOUT_MS=5000`
//! - `DISPATCHBOX__TRANSPORT__MAX_REDIRECTS=3`
//!
//! The proxy URI can also be supplied as `DISPATCHBOX_PROXY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/dispatchbox.toml`.
//! This can be overridden using the `DISPATCHBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, DefaultsConfig, TransportConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
