//! Configuration management for LinkChain

use crate::blockchain::ValidationRules;
use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            p2p_port: default_p2p_port(),
            bind_address: default_bind_address(),
            bootstrap_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub strict_timestamps: bool,
    #[serde(default = "default_max_future_drift_secs")]
    pub max_future_drift_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strict_timestamps: false,
            max_future_drift_secs: default_max_future_drift_secs(),
        }
    }
}

impl LedgerConfig {
    pub fn validation_rules(&self) -> ValidationRules {
        let max_future_drift_ms = self.max_future_drift_secs.saturating_mul(1000);
        if self.strict_timestamps {
            ValidationRules::strict(max_future_drift_ms)
        } else {
            ValidationRules {
                max_future_drift_ms,
                ..ValidationRules::default()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Loads `config.toml` from the working directory, falling back to defaults
/// when it is absent, then applies environment overrides.
pub fn load_config() -> Result<Config> {
    load(Path::new(DEFAULT_CONFIG_PATH), false)
}

/// Loads an explicitly named config file. Unlike [`load_config`], the file must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    load(path.as_ref(), true)
}

fn load(path: &Path, required: bool) -> Result<Config> {
    let config_str = read_config_file(path, required)?;
    let mut config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path, required: bool) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound && !required => Ok(String::new()),
        Err(e) => Err(ChainError::Config(format!(
            "cannot read config file {}: {}",
            path.display(),
            e
        ))),
    }
}

impl Config {
    /// Applies `HTTP_PORT`, `P2P_PORT` and `PEERS` (comma separated) from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("HTTP_PORT") {
            self.network.http_port = parse_port("HTTP_PORT", &port)?;
        }
        if let Some(port) = lookup("P2P_PORT") {
            self.network.p2p_port = parse_port("P2P_PORT", &port)?;
        }
        if let Some(peers) = lookup("PEERS") {
            self.network.bootstrap_peers = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.http_port == 0 || self.network.p2p_port == 0 {
            return Err(ChainError::Config("ports must be non-zero".to_string()));
        }
        if self.network.http_port == self.network.p2p_port {
            return Err(ChainError::Config(format!(
                "http_port and p2p_port must differ (both {})",
                self.network.http_port
            )));
        }
        if self.network.bind_address.is_empty() {
            return Err(ChainError::Config("network.bind_address must be set".to_string()));
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ChainError::Config(format!("{} must be a port number: {}", key, e)))
}

fn default_http_port() -> u16 {
    3001
}

fn default_p2p_port() -> u16 {
    6001
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_max_future_drift_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
