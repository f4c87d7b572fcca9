//! Server configuration: defaults and TOML file loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Why configuration loading failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One bearer token granting access as a named principal.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    /// The token value clients present.
    pub token: String,
    /// Principal name the token resolves to.
    pub principal: String,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Hard ceiling for one Streamable turn, in seconds.
    pub request_timeout_secs: u64,
    /// How long a cancelled turn may take to acknowledge, in milliseconds.
    pub cancel_grace_ms: u64,
    /// Reject requests whose Origin misses the allow-list. Off by default;
    /// mismatches are only logged.
    pub enforce_origin: bool,
    /// Extra origins accepted verbatim.
    pub extra_origins: Vec<String>,
    /// Bearer tokens. Empty means open access as one local principal.
    pub auth_tokens: Vec<TokenEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            request_timeout_secs: 30,
            cancel_grace_ms: 1000,
            enforce_origin: false,
            extra_origins: Vec::new(),
            auth_tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// The address to bind, as host:port.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Turn deadline as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Cancellation grace as a duration.
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

/// Load configuration from an optional TOML file; `None` means defaults.
pub fn load_config(path: Option<&str>) -> Result<ServerConfig, ConfigError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(Path::new(path))?;
            Ok(toml::from_str(&raw)?)
        }
        None => Ok(ServerConfig::default()),
    }
}
