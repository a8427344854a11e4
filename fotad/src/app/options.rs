//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::ota::delivery::DeliverySettings;
use crate::storage::settings::Settings;
use crate::workers::watchdog;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Base URL of the LwM2M server REST API
    pub transport_base_url: String,

    /// Upper bound on any single transport request
    pub transport_timeout: Duration,

    /// Package storage
    pub packages: PackageOptions,

    /// Chunked delivery settings
    pub delivery: DeliverySettings,

    /// Server configuration
    pub server: ServerOptions,

    /// Watchdog worker options
    pub watchdog: watchdog::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            transport_base_url: settings.transport.base_url.clone(),
            transport_timeout: Duration::from_secs(settings.transport.request_timeout_secs),
            packages: PackageOptions {
                dir: settings.packages.dir.clone(),
                cache_capacity: settings.packages.cache_capacity,
            },
            delivery: settings.delivery.to_delivery_settings(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            watchdog: watchdog::Options {
                interval: Duration::from_secs(settings.watchdog.interval_secs),
            },
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Package storage options
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Directory holding `<package id>.bin` files
    pub dir: PathBuf,

    /// Maximum cached packages
    pub cache_capacity: u64,
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
