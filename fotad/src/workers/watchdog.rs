//! Watchdog worker failing stalled pushes

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ota::orchestrator::UpdateOrchestrator;

/// Watchdog worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between sweeps
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Run the watchdog worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &UpdateOrchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Watchdog worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Watchdog worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        debug!("Sweeping update sessions...");

        let expired = orchestrator.expire_stale_sessions(Instant::now()).await;
        if expired > 0 {
            warn!("Watchdog failed {} stalled update sessions", expired);
        }
    }
}
