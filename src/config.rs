// src/config.rs

//! Manages server configuration: loading, resolving dynamic values, and validation.

use crate::core::protocol::DEFAULT_MAX_LINE_LENGTH;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::warn;

/// The largest chunk the server will read and write in one step.
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// A size given either as a plain number of bytes or as a string with a unit.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum SizeConfig {
    Bytes(usize),
    String(String),
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_file_path")]
    file_path: String,
    #[serde(default = "default_chunk_size_config")]
    chunk_size: SizeConfig,
    #[serde(default = "default_max_line_length")]
    max_line_length: usize,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default = "default_max_chunks_per_tick")]
    max_chunks_per_tick: usize,
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    poll_timeout: Duration,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    12345
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_file_path() -> String {
    "audio.mp3".to_string()
}
fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_size_config() -> SizeConfig {
    SizeConfig::Bytes(default_chunk_size())
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
fn default_max_clients() -> usize {
    1024
}
fn default_max_chunks_per_tick() -> usize {
    16
}
fn default_poll_timeout() -> Duration {
    Duration::from_millis(250)
}

/// Represents the final, validated, and resolved server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// The file whose bytes are streamed to clients.
    pub file_path: String,
    /// Size of each chunk read from the source and written to a client.
    pub chunk_size: usize,
    /// Longest accepted command or argument line, in bytes.
    pub max_line_length: usize,
    pub max_clients: usize,
    /// How many chunks one session may write before yielding to the others.
    pub max_chunks_per_tick: usize,
    /// Upper bound on a single wait for readiness; also bounds shutdown latency.
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            file_path: default_file_path(),
            chunk_size: default_chunk_size(),
            max_line_length: default_max_line_length(),
            max_clients: default_max_clients(),
            max_chunks_per_tick: default_max_chunks_per_tick(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses, resolves and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            log_level: raw_config.log_level,
            file_path: raw_config.file_path,
            chunk_size: resolve_size(raw_config.chunk_size)?,
            max_line_length: raw_config.max_line_length,
            max_clients: raw_config.max_clients,
            max_chunks_per_tick: raw_config.max_chunks_per_tick,
            poll_timeout: raw_config.poll_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.file_path.trim().is_empty() {
            return Err(anyhow!("file_path cannot be empty"));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(anyhow!(
                "chunk_size must be between 1 and {} bytes",
                MAX_CHUNK_SIZE
            ));
        }
        if self.max_line_length == 0 {
            return Err(anyhow!("max_line_length cannot be 0"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_chunks_per_tick == 0 {
            return Err(anyhow!("max_chunks_per_tick cannot be 0"));
        }
        if self.poll_timeout.is_zero() {
            return Err(anyhow!("poll_timeout cannot be 0"));
        }
        if self.poll_timeout > Duration::from_secs(5) {
            warn!(
                "poll_timeout of {:?} delays shutdown requests by up to that long.",
                self.poll_timeout
            );
        }
        Ok(())
    }

    /// Resolves `host:port` into the socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve listen address '{}:{}'", self.host, self.port))?
            .next()
            .ok_or_else(|| anyhow!("No address found for '{}:{}'", self.host, self.port))
    }
}

/// Resolves a `SizeConfig` into a number of bytes.
fn resolve_size(cfg: SizeConfig) -> Result<usize> {
    match cfg {
        SizeConfig::Bytes(b) => Ok(b),
        SizeConfig::String(s) => {
            let s_lower = s.trim().to_lowercase();
            if let Some(val_str) = s_lower.strip_suffix("mb") {
                parse_size_string(&s, val_str, 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('m') {
                parse_size_string(&s, val_str, 1024 * 1024)
            } else if let Some(val_str) = s_lower.strip_suffix("kb") {
                parse_size_string(&s, val_str, 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('k') {
                parse_size_string(&s, val_str, 1024)
            } else if let Some(val_str) = s_lower.strip_suffix('b') {
                parse_size_string(&s, val_str, 1)
            } else {
                s_lower.parse().with_context(|| {
                    format!("Invalid size '{s}'. Must be a number of bytes or have a unit (e.g., '4kb').")
                })
            }
        }
    }
}

/// Parses a string number with a unit (b, kb, mb) and applies a multiplier.
fn parse_size_string(original_str: &str, value_str: &str, multiplier: u64) -> Result<usize> {
    let value: u64 = value_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in size value: '{original_str}'"))?;
    let result_u64 = value.saturating_mul(multiplier);
    usize::try_from(result_u64).map_err(|_| {
        anyhow!(
            "size value '{}' is too large for this system's architecture",
            original_str
        )
    })
}
