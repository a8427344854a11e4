//! Server state

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::package::PackageCache;
use crate::observe::ObservationStore;
use crate::ota::orchestrator::UpdateOrchestrator;
use crate::transport::ResourceReader;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: UpdateOrchestrator,
    pub observations: Arc<ObservationStore>,
    pub packages: Arc<PackageCache>,
    pub reader: Arc<dyn ResourceReader>,

    /// Directory holding `<package id>.bin` files
    pub package_dir: PathBuf,
}

impl ServerState {
    pub fn new(
        orchestrator: UpdateOrchestrator,
        observations: Arc<ObservationStore>,
        packages: Arc<PackageCache>,
        reader: Arc<dyn ResourceReader>,
        package_dir: PathBuf,
    ) -> Self {
        Self {
            orchestrator,
            observations,
            packages,
            reader,
            package_dir,
        }
    }

    pub fn package_file(&self, package_key: &str) -> PathBuf {
        self.package_dir.join(format!("{}.bin", package_key))
    }
}
