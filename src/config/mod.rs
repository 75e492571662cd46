//! Configuration module
//!
//! Handles loading, validating and saving LineRelay configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{TokenRange, DEFAULT_BASE_PORT};
use crate::sim::sim_time;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Line length must be at least 2, got {0}")]
    InvalidLineLength(usize),

    #[error("Stop deadline {stop} must come after start offset {start} (both non-negative)")]
    InvalidSchedule { start: f64, stop: f64 },

    #[error("Random range [{min}, {max}] is empty")]
    InvalidRandomRange { min: i32, max: i32 },

    #[error("Hop latency must be positive, got {0}")]
    InvalidLatency(f64),

    #[error("Ports {base}..{base}+{count} do not fit in the port range")]
    PortOverflow { base: u16, count: usize },

    #[error("Time unit must be at least 1 ms")]
    InvalidTimeUnit,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Relay scenario settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Live runtime settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// Relay scenario configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of agents in the line
    #[serde(default = "default_line_length")]
    pub line_length: usize,
    /// Time at which the origin emits the first token
    #[serde(default = "default_start_offset")]
    pub start_offset: f64,
    /// Time at which every agent stops
    #[serde(default = "default_stop_deadline")]
    pub stop_deadline: f64,
    /// Smallest generated token value
    #[serde(default = "default_random_min")]
    pub random_min: i32,
    /// Largest generated token value
    #[serde(default = "default_random_max")]
    pub random_max: i32,
    /// Time a token spends between two neighbors
    #[serde(default = "default_hop_latency")]
    pub hop_latency: f64,
    /// Seed for reproducible runs; agent `p` uses `seed + p`
    pub seed: Option<u64>,
}

fn default_line_length() -> usize {
    5
}

fn default_start_offset() -> f64 {
    1.0
}

fn default_stop_deadline() -> f64 {
    30.0
}

fn default_random_min() -> i32 {
    0
}

fn default_random_max() -> i32 {
    100
}

fn default_hop_latency() -> f64 {
    1.0
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            line_length: default_line_length(),
            start_offset: default_start_offset(),
            stop_deadline: default_stop_deadline(),
            random_min: default_random_min(),
            random_max: default_random_max(),
            hop_latency: default_hop_latency(),
            seed: None,
        }
    }
}

impl RelayConfig {
    pub fn random_range(&self) -> TokenRange {
        TokenRange::new(self.random_min, self.random_max)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.line_length < 2 {
            return Err(ConfigError::InvalidLineLength(self.line_length));
        }
        validate_schedule(self.start_offset, self.stop_deadline)?;
        if !self.random_range().is_valid() {
            return Err(ConfigError::InvalidRandomRange {
                min: self.random_min,
                max: self.random_max,
            });
        }
        // Must survive the conversion to clock resolution
        match sim_time(self.hop_latency) {
            Some(latency) if !latency.is_zero() => Ok(()),
            _ => Err(ConfigError::InvalidLatency(self.hop_latency)),
        }
    }
}

/// Requires `0 <= start < stop` once both are converted to clock time
pub fn validate_schedule(start: f64, stop: f64) -> ConfigResult<()> {
    match (sim_time(start), sim_time(stop)) {
        (Some(start_at), Some(stop_at)) if stop_at > start_at => Ok(()),
        _ => Err(ConfigError::InvalidSchedule { start, stop }),
    }
}

/// Live runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address every agent listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Agent `p` listens on `base_port + p`
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Wall-clock length of one time unit in ms
    #[serde(default = "default_time_unit")]
    pub time_unit_ms: u64,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_time_unit() -> u64 {
    100
}

fn default_connect_timeout() -> u64 {
    1000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            base_port: default_base_port(),
            time_unit_ms: default_time_unit(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self, line_length: usize) -> ConfigResult<()> {
        if self.time_unit_ms == 0 {
            return Err(ConfigError::InvalidTimeUnit);
        }
        let last = usize::from(self.base_port) + line_length.saturating_sub(1);
        if last > usize::from(u16::MAX) {
            return Err(ConfigError::PortOverflow {
                base: self.base_port,
                count: line_length,
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("linerelay/config.toml")),
            Some(PathBuf::from("./linerelay.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check every section; a config that fails here must not start a run
    pub fn validate(&self) -> ConfigResult<()> {
        self.relay.validate()?;
        self.network.validate(self.relay.line_length)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        relay: RelayConfig {
            seed: Some(42),
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
