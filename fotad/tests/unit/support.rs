//! Shared test doubles

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use fotad::cache::package::PackageCache;
use fotad::errors::OtaError;
use fotad::lwm2m::{DeviceId, ResourcePath, ResourceValue};
use fotad::observe::ObservationStore;
use fotad::ota::delivery::{DeliverySettings, Dispatcher, WriteRequest};
use fotad::ota::kind::UpdateKind;
use fotad::ota::orchestrator::{Resolution, UpdateOrchestrator};
use fotad::ota::package::PackageDescriptor;
use fotad::ota::telemetry::{StatusEvent, TelemetrySink};
use fotad::transport::ResourceReader;

/// How the recording dispatcher answers writes
#[derive(Debug, Clone)]
pub enum DispatchMode {
    /// Acknowledge immediately
    Ack,

    /// Refuse with the given reason
    Fail(String),

    /// Never answer
    Hang,

    /// Acknowledge once the test opens the gate
    Gated,
}

pub struct RecordingDispatcher {
    mode: Mutex<DispatchMode>,
    writes: Mutex<Vec<(DeviceId, WriteRequest)>>,
    gate: Semaphore,
}

impl RecordingDispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            writes: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }

    pub fn set_mode(&self, mode: DispatchMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn writes(&self) -> Vec<(DeviceId, WriteRequest)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Let `n` gated writes complete
    pub fn open_gate(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Wait until at least `n` writes were issued
    pub async fn wait_for_writes(&self, n: usize) {
        let wait = async {
            while self.write_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("writes were not issued in time");
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn write(&self, device: &DeviceId, request: &WriteRequest) -> Result<(), OtaError> {
        self.writes
            .lock()
            .unwrap()
            .push((device.clone(), request.clone()));

        let mode = self.mode.lock().unwrap().clone();
        match mode {
            DispatchMode::Ack => Ok(()),
            DispatchMode::Fail(reason) => Err(OtaError::DispatchFailure(reason)),
            DispatchMode::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            DispatchMode::Gated => {
                let permit = self.gate.acquire().await.unwrap();
                permit.forget();
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<StatusEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingReader {
    reads: Mutex<Vec<(DeviceId, ResourcePath)>>,
}

impl RecordingReader {
    pub fn reads(&self) -> Vec<(DeviceId, ResourcePath)> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceReader for RecordingReader {
    async fn read(&self, device: &DeviceId, path: &ResourcePath) -> Result<(), OtaError> {
        self.reads.lock().unwrap().push((device.clone(), *path));
        Ok(())
    }
}

pub fn settings(chunk_size: usize) -> DeliverySettings {
    DeliverySettings {
        chunk_size,
        write_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

/// Orchestrator wired to in-memory collaborators
pub struct Harness {
    pub orchestrator: UpdateOrchestrator,
    pub observations: Arc<ObservationStore>,
    pub packages: Arc<PackageCache>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl Harness {
    pub fn new(mode: DispatchMode, settings: DeliverySettings) -> Self {
        let observations = Arc::new(ObservationStore::new());
        let packages = Arc::new(PackageCache::new(8));
        let dispatcher = Arc::new(RecordingDispatcher::new(mode));
        let telemetry = Arc::new(RecordingTelemetry::default());

        let orchestrator = UpdateOrchestrator::new(
            observations.clone(),
            packages.clone(),
            dispatcher.clone(),
            telemetry.clone(),
            settings,
        );

        Self {
            orchestrator,
            observations,
            packages,
            dispatcher,
            telemetry,
        }
    }

    /// Descriptor whose binary is available in the package cache
    pub fn cached_package(&self, data: &[u8], title: &str, version: &str) -> PackageDescriptor {
        let package = uncached_package(data.len() as u64, title, version);
        self.packages.insert(package.key(), data.to_vec());
        package
    }

    pub fn report(&self, device: &DeviceId, path: ResourcePath, value: impl Into<ResourceValue>) {
        self.observations.record(device, path, value.into());
    }

    pub fn report_code(&self, device: &DeviceId, path: ResourcePath, code: i64) {
        self.observations.record(device, path, ResourceValue::Integer(code));
    }

    /// Record a full firmware status report
    pub fn report_firmware(&self, device: &DeviceId, state: i64, result: i64, version: &str, name: &str) {
        let kind = UpdateKind::Firmware;
        self.report_code(device, kind.state_path(), state);
        self.report_code(device, kind.result_path(), result);
        self.report(device, kind.version_path(), version);
        self.report(device, kind.name_path(), name);
    }

    /// Resolve every path in order, returning the last resolution
    pub async fn resolve_all(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
        paths: &[ResourcePath],
    ) -> Resolution {
        let mut last = Resolution::Stale;
        for path in paths {
            last = self
                .orchestrator
                .on_observation_resolved(device, kind, path)
                .await;
        }
        last
    }
}

pub fn uncached_package(size: u64, title: &str, version: &str) -> PackageDescriptor {
    PackageDescriptor::new(Uuid::new_v4(), size)
        .with_title(title)
        .with_version(version)
}
