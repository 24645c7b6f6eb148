//! # Configuration
//!
//! relaychat reads an optional TOML file with one section per role:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5555
//! max_line_len = 4096
//! outbound_queue = 256
//!
//! [client]
//! host = "localhost"
//! port = 5555
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Values given on the command line win over the file; missing sections fall
//! back to [`Config::default`].
//!
//! ```rust,no_run
//! use relaychat::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("relaychat.toml").await?;
//!     let config = Config::load("relaychat.toml").await?;
//!     println!("Server port: {}", config.server.port);
//!     Ok(())
//! }
//! ```

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Port the server listens on when nothing else is configured
pub const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Longest accepted inbound line in bytes, terminator excluded
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Lines queued per connection before it is treated as stalled and closed
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_max_line_len() -> usize { 4096 }
fn default_outbound_queue() -> usize { 256 }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_line_len: default_max_line_len(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig { host: "localhost".to_string(), port: DEFAULT_PORT }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: "info".to_string() }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path).await
        } else {
            debug!("No config file at {}; using defaults", path);
            Ok(Config::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content).await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
