//! Configuration for the caller-ID bridge.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! Resolution order:
//!
//! 1. `CALLERID_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./callerid.toml` (current directory)
//! 3. platform config dir (`~/.config/callerid-bridge/config.toml` on
//!    Linux/macOS, `%APPDATA%\callerid-bridge\config.toml` on Windows)
//! 4. built-in defaults (no file required)
//!
//! Individual values can then be overridden via environment variables:
//! `CALLERID_BRIDGE_SERIAL_BAUD`, `CALLERID_BRIDGE_SERIAL_TIMEOUT_MS`,
//! `CALLERID_BRIDGE_SERIAL_INIT`, `CALLERID_BRIDGE_EVENT_BUFFER`,
//! `CALLERID_BRIDGE_LOG`.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidOverride { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

/// Modem port parameters used by the real serial bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate for the caller-ID modem port.
    pub baud_rate: u32,
    /// Read timeout in milliseconds for the listener loop.
    pub timeout_ms: u64,
    /// Command written to the modem to enable caller-ID reporting.
    pub init_command: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout_ms: 1000,
            init_command: "AT+VCID=1".to_string(),
        }
    }
}

/// Event stream tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of the broadcast channel carrying caller events.
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with automatic path resolution and env overrides.
    pub fn load() -> ConfigResult<Self> {
        let mut config = match resolve_config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(v) = std::env::var("CALLERID_BRIDGE_SERIAL_BAUD") {
            self.serial.baud_rate = parse_override("CALLERID_BRIDGE_SERIAL_BAUD", &v)?;
        }
        if let Ok(v) = std::env::var("CALLERID_BRIDGE_SERIAL_TIMEOUT_MS") {
            self.serial.timeout_ms = parse_override("CALLERID_BRIDGE_SERIAL_TIMEOUT_MS", &v)?;
        }
        if let Ok(v) = std::env::var("CALLERID_BRIDGE_SERIAL_INIT") {
            self.serial.init_command = v;
        }
        if let Ok(v) = std::env::var("CALLERID_BRIDGE_EVENT_BUFFER") {
            self.events.buffer = parse_override("CALLERID_BRIDGE_EVENT_BUFFER", &v)?;
        }
        if let Ok(v) = std::env::var("CALLERID_BRIDGE_LOG") {
            self.logging.filter = v;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Resolve the config file path, or `None` to use defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("CALLERID_BRIDGE_CONFIG") {
        return Some(PathBuf::from(explicit));
    }
    let local = PathBuf::from("callerid.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(dirs) = ProjectDirs::from("", "", "callerid-bridge") {
        let candidate = dirs.config_dir().join("config.toml");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
