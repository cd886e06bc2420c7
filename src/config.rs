use crate::constants::{DEFAULT_LOCK_WAIT_SECS, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
use crate::core_network::Endpoint;
use crate::core_session::SessionOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub username: String,
    pub password: String,
    pub case_sensitive: bool,
    pub lock_wait_secs: u64,
    pub preserve_timestamps: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            username: String::from("anonymous"),
            password: String::new(),
            case_sensitive: true,
            lock_wait_secs: DEFAULT_LOCK_WAIT_SECS,
            preserve_timestamps: true,
        }
    }
}

impl ClientConfig {
    /// Connection parameters for a disconnected session.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.clone())
            .with_port(self.port)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            case_sensitive: self.case_sensitive,
            lock_wait: Duration::from_secs(self.lock_wait_secs),
            preserve_timestamps: self.preserve_timestamps,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        Ok(toml::from_str(config_str)?)
    }
}
