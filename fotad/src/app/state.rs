//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::cache::package::PackageCache;
use crate::errors::OtaError;
use crate::observe::ObservationStore;
use crate::ota::orchestrator::UpdateOrchestrator;
use crate::ota::telemetry::TracingTelemetry;
use crate::server::state::ServerState;
use crate::transport::HttpTransport;

/// Main application state
pub struct AppState {
    /// Update orchestrator
    pub orchestrator: UpdateOrchestrator,

    /// Device-reported values
    pub observations: Arc<ObservationStore>,

    /// Package binaries
    pub packages: Arc<PackageCache>,

    /// Transport to the LwM2M server
    pub transport: Arc<HttpTransport>,
}

impl AppState {
    /// Initialize application state
    pub fn init(options: &AppOptions) -> Result<Self, OtaError> {
        info!("Initializing application state...");

        let transport = Arc::new(HttpTransport::new(
            &options.transport_base_url,
            options.transport_timeout,
        )?);
        let observations = Arc::new(ObservationStore::new());
        let packages = Arc::new(PackageCache::new(options.packages.cache_capacity));

        let orchestrator = UpdateOrchestrator::new(
            observations.clone(),
            packages.clone(),
            transport.clone(),
            Arc::new(TracingTelemetry),
            options.delivery.clone(),
        );

        Ok(Self {
            orchestrator,
            observations,
            packages,
            transport,
        })
    }

    /// Build the state handed to the HTTP server
    pub fn server_state(&self, options: &AppOptions) -> ServerState {
        ServerState::new(
            self.orchestrator.clone(),
            self.observations.clone(),
            self.packages.clone(),
            self.transport.clone(),
            options.packages.dir.clone(),
        )
    }

    /// Shutdown application state
    pub fn shutdown(&self) {
        info!(
            "Shutting down application state ({} sessions, {} cached packages)...",
            self.orchestrator.registry().len(),
            self.packages.len()
        );
    }
}
