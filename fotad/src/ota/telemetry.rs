//! Lifecycle status reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lwm2m::DeviceId;
use crate::ota::kind::UpdateKind;
use crate::ota::status::LifecycleStatus;

/// Status change of an update session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Device endpoint
    pub device: DeviceId,

    /// Firmware or software
    pub kind: UpdateKind,

    /// Package the session targets
    pub package: Option<Uuid>,

    /// New status
    pub status: LifecycleStatus,

    /// Diagnostic reason, set for failures
    pub reason: Option<String>,

    /// When the change was recorded
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        device: DeviceId,
        kind: UpdateKind,
        package: Option<Uuid>,
        status: LifecycleStatus,
        reason: Option<String>,
    ) -> Self {
        Self {
            device,
            kind,
            package,
            status,
            reason,
            at: Utc::now(),
        }
    }
}

/// Downstream consumer of status changes
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: StatusEvent);
}

/// Sink writing status changes to the log
#[derive(Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn publish(&self, event: StatusEvent) {
        let package = event
            .package
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        match &event.reason {
            Some(reason) if event.status == LifecycleStatus::Failed => warn!(
                device = %event.device,
                kind = %event.kind,
                package = %package,
                "Update status {}: {}",
                event.status,
                reason
            ),
            _ => info!(
                device = %event.device,
                kind = %event.kind,
                package = %package,
                "Update status {}",
                event.status
            ),
        }
    }
}
