//! Realtime client configuration

use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::domain::foundation::DataType;

use super::error::ValidationError;

const MAX_RECONNECT_DELAY_MS: u64 = 5 * 60 * 1000;

/// Connection settings for the realtime client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Full endpoint URL; overrides host, secure and path when set
    pub url: Option<String>,

    /// Host (and optional port) of the realtime server
    #[serde(default = "default_host")]
    pub host: String,

    /// Use wss instead of ws
    #[serde(default)]
    pub secure: bool,

    /// Endpoint path on the server
    #[serde(default = "default_path")]
    pub path: String,

    /// Connect at startup and whenever a consumer binding mounts
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,

    /// Fixed delay before the single reconnect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Data type sent with every subscribe frame
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

impl ClientConfig {
    /// Configuration for a page served from `origin`.
    ///
    /// The realtime endpoint lives on the same host; https pages get wss.
    pub fn for_page_origin(origin: &str) -> Result<Self, ValidationError> {
        let parsed =
            Url::parse(origin).map_err(|_| ValidationError::InvalidOrigin(origin.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ValidationError::InvalidOrigin(origin.to_string()))?;
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            host,
            secure: parsed.scheme() == "https",
            ..Self::default()
        })
    }

    /// Resolved endpoint URL
    pub fn endpoint(&self) -> Result<Url, ValidationError> {
        let raw = match &self.url {
            Some(url) => url.clone(),
            None => {
                let scheme = if self.secure { "wss" } else { "ws" };
                format!("{scheme}://{}{}", self.host, self.path)
            }
        };
        let url = Url::parse(&raw).map_err(|_| ValidationError::InvalidUrl(raw.clone()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn data_type(&self) -> Result<DataType, ValidationError> {
        DataType::new(&self.data_type).map_err(|_| ValidationError::MissingRequired("data_type"))
    }

    /// Validate client configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_none() {
            if self.host.trim().is_empty() {
                return Err(ValidationError::MissingRequired("host"));
            }
            if !self.path.starts_with('/') {
                return Err(ValidationError::InvalidPath);
            }
        }
        if self.reconnect_delay_ms == 0 || self.reconnect_delay_ms > MAX_RECONNECT_DELAY_MS {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        self.data_type()?;
        self.endpoint()?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            secure: false,
            path: default_path(),
            auto_connect: default_auto_connect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            data_type: default_data_type(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_host() -> String {
    "localhost:3001".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_auto_connect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_data_type() -> String {
    DataType::STRESS_TEST_PROGRESS.to_string()
}

fn default_log_level() -> String {
    "info,testweb_realtime=debug".to_string()
}
