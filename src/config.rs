//! Configuration for the audio server and its clients
//!
//! Every field has a default, so an empty or missing `config.toml` yields a
//! working setup: server and clients on port 10345, 8-bit mono at 40960 Hz.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::protocol::ServerInfo;

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the platform config directory, if present
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Location of the per-user configuration file
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("guru", "nidi", "prok")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.client.validate()
    }
}

/// Where the server sends its audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// System default output device
    #[default]
    Default,
    /// Discard audio into memory (headless hosts, tests)
    Null,
}

/// Audio server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Control port; the data port is `port + 1`
    pub port: u16,
    pub sample_rate: i32,
    pub sample_size: i32,
    pub channels: i32,
    pub output: OutputKind,
    /// Output device name; the system default when unset
    pub device: Option<String>,
    /// Send STOP to a server already holding the port before binding
    pub replace_existing: bool,
    pub io_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            channels: DEFAULT_CHANNELS,
            output: OutputKind::Default,
            device: None,
            replace_existing: false,
            io_timeout_ms: IO_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Default settings listening on `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo::new(self.sample_rate, self.sample_size, self.channels)
    }

    pub fn data_port(&self) -> Result<u16> {
        data_port(self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        data_port(self.port)?;
        if self.sample_rate <= 0 {
            return Err(Error::Config(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !matches!(self.sample_size, 8 | 16) {
            return Err(Error::Config(format!(
                "sample_size must be 8 or 16, got {}",
                self.sample_size
            )));
        }
        if !matches!(self.channels, 1 | 2) {
            return Err(Error::Config(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        Ok(())
    }
}

/// Client-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Control port of the server to use
    pub port: u16,
    /// PING attempts after spawning a server
    pub spawn_attempts: u32,
    pub spawn_interval_ms: u64,
    /// Server executable; resolved next to the current binary when unset
    pub server_program: Option<PathBuf>,
    pub io_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            spawn_attempts: SPAWN_ATTEMPTS,
            spawn_interval_ms: SPAWN_INTERVAL_MS,
            server_program: None,
            io_timeout_ms: IO_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn data_port(&self) -> Result<u16> {
        data_port(self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        data_port(self.port)?;
        if self.spawn_attempts == 0 {
            return Err(Error::Config("spawn_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Data channel port paired with a control port
pub fn data_port(port: u16) -> Result<u16> {
    port.checked_add(1)
        .ok_or_else(|| crate::error::NetworkError::InvalidPort(port).into())
}
