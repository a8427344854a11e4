//! In-memory observation store

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::lwm2m::{DeviceId, ResourcePath, ResourceValue};
use crate::observe::snapshot::ResourceSnapshot;

/// Source of device-reported resource values
pub trait ObservationProvider: Send + Sync {
    /// Snapshot of everything the device has reported so far
    fn snapshot(&self, device: &DeviceId) -> Option<ResourceSnapshot>;
}

/// Observation store fed by the transport layer
#[derive(Default)]
pub struct ObservationStore {
    devices: RwLock<HashMap<DeviceId, ResourceSnapshot>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value reported by a device
    pub fn record(&self, device: &DeviceId, path: ResourcePath, value: ResourceValue) {
        debug!("Observed {} {} = {:?}", device, path, value);
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        devices.entry(device.clone()).or_default().set(path, value);
    }

    /// Drop everything known about a device
    pub fn forget(&self, device: &DeviceId) -> Option<ResourceSnapshot> {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        devices.remove(device)
    }

    pub fn len(&self) -> usize {
        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObservationProvider for ObservationStore {
    fn snapshot(&self, device: &DeviceId) -> Option<ResourceSnapshot> {
        let devices = self.devices.read().unwrap_or_else(|e| e.into_inner());
        devices.get(device).cloned()
    }
}
