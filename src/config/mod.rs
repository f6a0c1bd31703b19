//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `TESTWEB_REALTIME_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use testweb_realtime::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Streaming from {}", config.client.endpoint().unwrap());
//! ```

mod client;
mod error;
mod watch;

pub use client::ClientConfig;
pub use error::{ConfigError, ValidationError};
pub use watch::WatchConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Realtime connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Subscriptions for the command-line watcher
    #[serde(default)]
    pub watch: WatchConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TESTWEB_REALTIME` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TESTWEB_REALTIME__CLIENT__HOST=example.com` -> `client.host = example.com`
    /// - `TESTWEB_REALTIME__WATCH__TEST_IDS=t1,t2` -> `watch.test_ids = t1,t2`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TESTWEB_REALTIME")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.client.validate()?;
        Ok(())
    }
}
