//! Configuration system for Surge.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SURGE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/surge/config.toml
//!   3. ~/.config/surge/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeConfig {
    pub network: NetworkConfig,
    pub pool: PoolConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local TCP port for the control API.
    pub api_port: u16,
    /// Service under test, as `host:port`.
    pub target: String,
    /// Give up on a connection attempt after this many milliseconds.
    pub connect_timeout_ms: u64,
    /// Disable Nagle on every pooled connection.
    pub nodelay: bool,
}

/// Floor for the reconciler's idle pause. Zero would turn the loop into a
/// busy spin.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle pause between reconciliation ticks. Values below
    /// [`MIN_TICK_INTERVAL`] are raised to it.
    pub tick_interval_ms: u64,
}

/// Metric names the pool reports under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Gauge holding the current target peer count.
    pub desired: String,
    /// Up/down counter of connected peers.
    pub connected: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: 9100,
            target: "127.0.0.1:8080".to_string(),
            connect_timeout_ms: 5_000,
            nodelay: true,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            desired: "surge_desired_peers".to_string(),
            connected: "surge_connected_peers".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl PoolConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms).max(MIN_TICK_INTERVAL)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("surge")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SurgeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::parse(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SurgeConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file body. Missing sections fall back to defaults.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SURGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SurgeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SURGE_* overrides. `lookup` resolves a variable name; unparsable
    /// values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SURGE_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Some(v) = lookup("SURGE_NETWORK__TARGET") {
            self.network.target = v;
        }
        if let Some(v) = lookup("SURGE_NETWORK__CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.network.connect_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("SURGE_NETWORK__NODELAY") {
            self.network.nodelay = v == "true" || v == "1";
        }
        if let Some(v) = lookup("SURGE_POOL__TICK_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.pool.tick_interval_ms = ms;
            }
        }
        if let Some(v) = lookup("SURGE_METRICS__DESIRED") {
            self.metrics.desired = v;
        }
        if let Some(v) = lookup("SURGE_METRICS__CONNECTED") {
            self.metrics.connected = v;
        }
    }
}
