//! Monitor configuration
//!
//! Loaded from YAML, with the debug server address overridable through
//! `OCD_HOST` / `OCD_PORT` (a `.env` file is honored).

use ocdlink::builder::states::NoDispatcher;
use ocdlink::{ClientBuilder, ExponentialBackoff, FixedDelay, OcdClient};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid environment variable {name}: {value}")]
    InvalidEnvVar { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Seconds between memory polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
    /// Memory regions read on every poll
    #[serde(default)]
    pub watch: Vec<WatchedRegion>,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Delay between connection attempts
///
/// Without `max_delay_ms` the delay is fixed; with it, the delay doubles
/// per attempt up to that cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_delay_ms: None,
        }
    }
}

/// A block of target memory to poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedRegion {
    pub name: String,
    /// Start address, written as `0x2000_0000`, `0x20000000` or decimal
    #[serde(deserialize_with = "deserialize_address")]
    pub address: u32,
    /// Number of 32-bit words to read
    #[serde(default = "default_words")]
    pub words: usize,
}

fn default_host() -> String {
    ocdlink::config::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    ocdlink::config::DEFAULT_PORT
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_command_timeout_ms() -> u64 {
    5_000
}

fn default_reconnect_delay_ms() -> u64 {
    100
}

fn default_poll_interval() -> f64 {
    1.0
}

fn default_words() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_address<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Address {
        Number(u32),
        Text(String),
    }

    match Address::deserialize(deserializer)? {
        Address::Number(n) => Ok(n),
        Address::Text(text) => parse_address(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_address(text: &str) -> std::result::Result<u32, String> {
    let cleaned = text.trim().replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", text, e))
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: MonitorConfig = serde_yaml::from_str(&yaml_content)?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("OCD_HOST") {
            info!("Overriding host from environment variable");
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("OCD_PORT") {
            info!("Overriding port from environment variable");
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: "OCD_PORT".to_string(),
                value: port,
            })?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.host must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if self.server.command_timeout_ms == 0 || self.server.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server timeouts must be greater than 0".to_string(),
            ));
        }

        if let Some(max) = self.server.reconnect.max_delay_ms {
            if max < self.server.reconnect.delay_ms {
                return Err(ConfigError::ValidationError(
                    "server.reconnect.max_delay_ms must be at least delay_ms".to_string(),
                ));
            }
        }

        if !(self.poll_interval_secs > 0.0 && self.poll_interval_secs.is_finite()) {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        for region in &self.watch {
            if region.words == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "watch region '{}' must read at least one word",
                    region.name
                )));
            }
            let last_word = (region.words as u64 - 1)
                .checked_mul(4)
                .and_then(|span| u64::from(region.address).checked_add(span));
            if last_word.map_or(true, |last| last > u64::from(u32::MAX)) {
                return Err(ConfigError::ValidationError(format!(
                    "watch region '{}' runs past the end of the address space",
                    region.name
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    /// Client builder carrying the server settings; only the dispatcher
    /// remains to be chosen
    pub fn client_builder(&self) -> ClientBuilder<NoDispatcher> {
        let server = &self.server;
        let builder = OcdClient::builder()
            .host(server.host.clone())
            .port(server.port)
            .connect_timeout(Duration::from_millis(server.connect_timeout_ms))
            .command_timeout(Duration::from_millis(server.command_timeout_ms));

        let delay = Duration::from_millis(server.reconnect.delay_ms);
        match server.reconnect.max_delay_ms {
            Some(max) => builder
                .reconnect_policy(ExponentialBackoff::new(delay, Duration::from_millis(max))),
            None => builder.reconnect_policy(FixedDelay::new(delay)),
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Server: {}:{}", self.server.host, self.server.port);
        info!("  Command timeout: {} ms", self.server.command_timeout_ms);
        info!("  Poll interval: {} seconds", self.poll_interval_secs);
        for region in &self.watch {
            info!(
                "  Watch '{}': 0x{:08X} ({} words)",
                region.name, region.address, region.words
            );
        }
        info!("  Log level: {}", self.log_level);
    }
}
