//! Configuration management for TicketShare.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/ticketshare/config.toml` |
//! | macOS | `~/Library/Application Support/com.ticketshare.TicketShare/config.toml` |
//! | Windows | `%APPDATA%\ticketshare\TicketShare\config\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [host]
//! bind = "0.0.0.0:8080"
//! chunk_size = 1048576
//! handshake_timeout = "30s"
//! drain_timeout = "2m"
//! max_transfers = 1
//!
//! [receive]
//! output_dir = "/home/me/Downloads"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handshake::Ticket;
use crate::host::HostConfig;
use crate::transfer::ReceiveConfig;

/// Main configuration struct for TicketShare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host settings
    pub host: HostSettings,
    /// Receive settings
    pub receive: ReceiveSettings,
}

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Address the TCP listener binds to
    pub bind: String,
    /// Data chunk size in bytes
    pub chunk_size: usize,
    /// Time a receiver has to complete the handshake (`0s` disables)
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
    /// Time in-flight sessions get to finish on shutdown (`0s` waits forever)
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    /// Stop after this many successful transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transfers: Option<usize>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{}", crate::DEFAULT_PORT),
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            handshake_timeout: Duration::from_secs(crate::DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            drain_timeout: Duration::ZERO,
            max_transfers: None,
        }
    }
}

/// Receive settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveSettings {
    /// Directory received files are written to (current directory if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Write configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        std::fs::write(path, self.to_toml()?)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ticketshare", "TicketShare")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Build a [`HostConfig`] for offering `file_path` under `ticket`.
    pub fn host_config(
        &self,
        ticket: impl Into<Ticket>,
        file_path: impl Into<PathBuf>,
    ) -> HostConfig {
        let enabled = |t: Duration| Some(t).filter(|t| !t.is_zero());
        HostConfig::new(ticket, file_path)
            .with_chunk_size(self.host.chunk_size)
            .with_handshake_timeout(enabled(self.host.handshake_timeout))
            .with_drain_timeout(enabled(self.host.drain_timeout))
            .with_max_transfers(self.host.max_transfers)
    }

    /// Build a [`ReceiveConfig`] presenting `ticket`.
    pub fn receive_config(&self, ticket: impl Into<Ticket>) -> ReceiveConfig {
        let config = ReceiveConfig::new(ticket);
        match &self.receive.output_dir {
            Some(dir) => config.with_output_dir(dir),
            None => config,
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        let (digits, multiplier) = if let Some(secs) = s.strip_suffix('s') {
            (secs, 1)
        } else if let Some(mins) = s.strip_suffix('m') {
            (mins, 60)
        } else {
            return Err(serde::de::Error::custom(format!(
                "invalid duration '{s}', expected e.g. \"30s\" or \"2m\""
            )));
        };

        digits
            .trim()
            .parse::<u64>()
            .map(|n| Duration::from_secs(n.saturating_mul(multiplier)))
            .map_err(serde::de::Error::custom)
    }
}
