//! # Station Configuration
//!
//! Configuration for the station bridge daemon.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Configuration Priority                        │
//! │                                                                 │
//! │  1. Environment Variables (highest priority)                   │
//! │     FORECOURT_DEVICE_ADDR=192.168.0.50:2101                    │
//! │     FORECOURT_PROTOCOL_VERSION=16                               │
//! │                                                                 │
//! │  2. TOML Config File                                           │
//! │     ~/.config/forecourt/station.toml (Linux)                   │
//! │                                                                 │
//! │  3. Default Values (lowest priority)                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # station.toml
//! [device]
//! address = "192.168.0.50:2101"
//! protocol_version = 16
//! response_timeout_secs = 3
//!
//! [sync]
//! poll_interval_secs = 2
//! database_path = "/var/lib/forecourt/station.db"
//!
//! [invoicing]
//! cutoff_secs = 86400   # <= 0 disables the sweep
//!
//! [debug]
//! sink_path = "/tmp/forecourt-frames.log"  # optional flat dump of frames
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Settings
// =============================================================================

/// Settings for the station controller channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// TCP endpoint of the controller.
    #[serde(default = "default_address")]
    pub address: String,

    /// Controller protocol version. Version 16 speaks one opcode dialect,
    /// everything else the legacy one.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,

    /// Per-exchange response deadline (seconds).
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
}

fn default_address() -> String {
    "127.0.0.1:2101".to_string()
}

fn default_protocol_version() -> u32 {
    16
}

fn default_response_timeout() -> u64 {
    3
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            address: default_address(),
            protocol_version: default_protocol_version(),
            response_timeout_secs: default_response_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Settings for the synchronization loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_poll_interval() -> u64 {
    2
}

fn default_database_path() -> PathBuf {
    PathBuf::from("forecourt.db")
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            poll_interval_secs: default_poll_interval(),
            database_path: default_database_path(),
        }
    }
}

// =============================================================================
// Invoicing Settings
// =============================================================================

/// Settings for the invoicing cutoff sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicingSettings {
    /// Dispatches older than this many seconds are bulk-marked invoiced.
    /// Zero or negative disables the sweep entirely.
    #[serde(default = "default_cutoff")]
    pub cutoff_secs: i64,
}

fn default_cutoff() -> i64 {
    86_400
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        InvoicingSettings { cutoff_secs: default_cutoff() }
    }
}

impl InvoicingSettings {
    /// True when the cutoff sweep should run at all.
    pub fn is_enabled(&self) -> bool {
        self.cutoff_secs > 0
    }
}

// =============================================================================
// Debug Settings
// =============================================================================

/// Optional debugging aids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugSettings {
    /// When set, every decoded dispatch is also appended as a flat line to
    /// this file.
    #[serde(default)]
    pub sink_path: Option<PathBuf>,
}

// =============================================================================
// Station Configuration
// =============================================================================

/// Complete station bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    /// Controller channel settings.
    #[serde(default)]
    pub device: DeviceSettings,

    /// Loop settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Invoicing cutoff settings.
    #[serde(default)]
    pub invoicing: InvoicingSettings,

    /// Debug aids.
    #[serde(default)]
    pub debug: DebugSettings,
}

impl StationConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (station.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading station config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSave("no config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::ConfigSave(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSave(e.to_string()))?;

        info!(?path, "Station config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.address.is_empty() {
            return Err(SyncError::InvalidConfig("device.address must not be empty".into()));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.device.response_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "device.response_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("FORECOURT_DEVICE_ADDR") {
            debug!(address = %addr, "Overriding device address from environment");
            self.device.address = addr;
        }

        if let Ok(version) = std::env::var("FORECOURT_PROTOCOL_VERSION") {
            if let Ok(v) = version.parse::<u32>() {
                debug!(version = v, "Overriding protocol version from environment");
                self.device.protocol_version = v;
            }
        }

        if let Ok(path) = std::env::var("FORECOURT_DATABASE_PATH") {
            self.sync.database_path = PathBuf::from(path);
        }

        if let Ok(interval) = std::env::var("FORECOURT_POLL_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse::<u64>() {
                self.sync.poll_interval_secs = secs;
            }
        }

        if let Ok(cutoff) = std::env::var("FORECOURT_INVOICE_CUTOFF_SECS") {
            if let Ok(secs) = cutoff.parse::<i64>() {
                self.invoicing.cutoff_secs = secs;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "forecourt", "station")
            .map(|dirs| dirs.config_dir().join("station.toml"))
    }

    /// Per-exchange response deadline as a Duration.
    pub fn response_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.device.response_timeout_secs)
    }

    /// Loop interval as a Duration.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.poll_interval_secs)
    }
}
