//! Runtime Configuration
//!
//! Resolution order, later wins:
//! 1. Built-in defaults.
//! 2. A JSON file, from `--config <path>` or `JD_CONFIG_FILE`.
//! 3. Environment overrides: `JD_BIND`, `JD_PORT`, `JD_LOG_LEVEL`, `JD_NODE_TIMEOUT_SECS`.
//!
//! A variable that is set but unparseable is an error, as is an unreadable file.

use crate::node_client::types::Credentials;
use crate::store::types::Labels;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG_FILE: &str = "JD_CONFIG_FILE";
pub const ENV_BIND: &str = "JD_BIND";
/// Replaces only the port of the bind address.
pub const ENV_PORT: &str = "JD_PORT";
pub const ENV_LOG_LEVEL: &str = "JD_LOG_LEVEL";
pub const ENV_NODE_TIMEOUT_SECS: &str = "JD_NODE_TIMEOUT_SECS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Per-call timeout for node API requests.
    pub node_timeout_secs: u64,
    /// Nodes registered and connected at startup.
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub public_key: String,
    pub url: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub labels: Labels,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            log_level: "info".to_string(),
            node_timeout_secs: 30,
            nodes: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        Self::from_sources(path, |key| std::env::var(key).ok())
    }

    /// Loads the configuration with `env` standing in for the process environment.
    pub fn from_sources(path: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let mut config = match path.or_else(|| env(ENV_CONFIG_FILE).map(PathBuf::from)) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(value) = env(ENV_BIND) {
            config.bind_addr = parse_env(ENV_BIND, &value)?;
        }
        if let Some(value) = env(ENV_PORT) {
            config.bind_addr.set_port(parse_env(ENV_PORT, &value)?);
        }
        if let Some(value) = env(ENV_LOG_LEVEL) {
            config.log_level = value.trim().to_string();
        }
        if let Some(value) = env(ENV_NODE_TIMEOUT_SECS) {
            config.node_timeout_secs = parse_env(ENV_NODE_TIMEOUT_SECS, &value)?;
        }

        config.tracing_level()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|e| anyhow!("invalid log level {:?}: {}", self.log_level, e))
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid value {:?} for {}: {}", value, key, e))
}
