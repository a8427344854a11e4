//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::OtaError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::ota::delivery::DeliverySettings;

pub const DEFAULT_SETTINGS_FILE: &str = "/etc/fotad/settings.json";

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub json_logs: bool,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Device-management transport
    #[serde(default)]
    pub transport: TransportSettings,

    /// Chunked delivery
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Stalled session watchdog
    #[serde(default)]
    pub watchdog: WatchdogSettings,

    /// Package binaries
    #[serde(default)]
    pub packages: PackageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            server: ServerSettings::default(),
            transport: TransportSettings::default(),
            delivery: DeliveryConfig::default(),
            watchdog: WatchdogSettings::default(),
            packages: PackageSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OtaError> {
        let file = File::new(path.as_ref());
        if !file.exists().await {
            info!(
                "No settings file at {}, using defaults",
                file.path().display()
            );
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Device-management transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Base URL of the LwM2M server REST API
    #[serde(default = "default_transport_url")]
    pub base_url: String,

    /// Upper bound on any single HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_transport_url() -> String {
    "http://localhost:8081/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: default_transport_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Chunked delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Bytes per write; 0 sends each package in a single write
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    1024
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_session_timeout() -> u64 {
    600
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            write_timeout_ms: default_write_timeout(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

impl DeliveryConfig {
    pub fn to_delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            chunk_size: self.chunk_size,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
        }
    }
}

/// Watchdog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogSettings {
    #[serde(default = "default_watchdog_interval")]
    pub interval_secs: u64,
}

fn default_watchdog_interval() -> u64 {
    30
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_watchdog_interval(),
        }
    }
}

/// Package binary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSettings {
    /// Directory holding `<package id>.bin` files
    #[serde(default = "default_package_dir")]
    pub dir: PathBuf,

    /// Maximum number of packages held in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

fn default_package_dir() -> PathBuf {
    PathBuf::from("/var/lib/fotad/packages")
}

fn default_cache_capacity() -> u64 {
    16
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            dir: default_package_dir(),
            cache_capacity: default_cache_capacity(),
        }
    }
}
