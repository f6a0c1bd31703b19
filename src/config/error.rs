//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),

    #[error("Server URL must use ws or wss, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Endpoint path must start with '/'")]
    InvalidPath,

    #[error("Reconnect delay must be between 1 ms and 5 minutes")]
    InvalidReconnectDelay,

    #[error("Invalid page origin '{0}'")]
    InvalidOrigin(String),
}
