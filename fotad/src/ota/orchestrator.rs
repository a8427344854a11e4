//! Update orchestration entry points
//!
//! Observation events, status reports and scheduling requests for one
//! session are serialized on the session lock. Writes are prepared under
//! that lock and dispatched after it is released; each acknowledgment
//! re-acquires it before the cursor moves on.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::OtaError;
use crate::lwm2m::{DeviceId, ResourcePath};
use crate::observe::ObservationProvider;
use crate::ota::delivery::{
    continue_push, start_push, ChunkSource, DeliverySettings, Dispatcher, PreparedWrite,
    WriteRequest,
};
use crate::ota::kind::UpdateKind;
use crate::ota::mapper::map_status;
use crate::ota::package::PackageDescriptor;
use crate::ota::registry::SessionRegistry;
use crate::ota::session::{PathResolution, SessionSummary, UpdateSession};
use crate::ota::status::LifecycleStatus;
use crate::ota::telemetry::{StatusEvent, TelemetrySink};
use crate::ota::trigger::{retry_requested, should_start};

/// Outcome of an observation event or a re-evaluation request
#[derive(Debug)]
pub enum Resolution {
    /// No update was ever scheduled for this device and kind
    NoSession,

    /// The path was not pending
    Stale,

    /// Other reads are still outstanding
    Awaiting { remaining: usize },

    /// Evaluation ran and decided not to push
    NotTriggered,

    /// A write for this session is still outstanding
    InFlight,

    /// A retry was called for but no package is scheduled
    NoPackage,

    /// The push could not start
    Failed { reason: String },

    /// The first chunk was handed to the dispatcher
    Dispatched {
        chunk_index: usize,
        handle: JoinHandle<()>,
    },
}

impl Resolution {
    pub fn name(&self) -> &'static str {
        match self {
            Resolution::NoSession => "no_session",
            Resolution::Stale => "stale",
            Resolution::Awaiting { .. } => "awaiting",
            Resolution::NotTriggered => "not_triggered",
            Resolution::InFlight => "in_flight",
            Resolution::NoPackage => "no_package",
            Resolution::Failed { .. } => "failed",
            Resolution::Dispatched { .. } => "dispatched",
        }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, Resolution::Dispatched { .. })
    }

    /// Wait for the delivery started by this resolution, if any
    pub async fn join(self) {
        if let Resolution::Dispatched { handle, .. } = self {
            if let Err(e) = handle.await {
                error!("Delivery task ended abnormally: {}", e);
            }
        }
    }
}

enum Evaluation {
    Push(PreparedWrite),
    Done(Resolution),
}

/// Update orchestrator shared by every device connection
#[derive(Clone)]
pub struct UpdateOrchestrator {
    registry: Arc<SessionRegistry>,
    observations: Arc<dyn ObservationProvider>,
    chunks: Arc<dyn ChunkSource>,
    dispatcher: Arc<dyn Dispatcher>,
    telemetry: Arc<dyn TelemetrySink>,
    settings: DeliverySettings,
}

impl UpdateOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        observations: Arc<dyn ObservationProvider>,
        chunks: Arc<dyn ChunkSource>,
        dispatcher: Arc<dyn Dispatcher>,
        telemetry: Arc<dyn TelemetrySink>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            observations,
            chunks,
            dispatcher,
            telemetry,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Install a new package for a device.
    ///
    /// Returns the paths that must be read from the device before the push
    /// is evaluated.
    pub async fn schedule_update(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
        descriptor: PackageDescriptor,
    ) -> Vec<ResourcePath> {
        let handle = self.registry.get_or_create(device, kind);
        let mut session = handle.lock().await;

        info!(
            "Scheduling {} package {} ({:?} {:?}) for {}",
            kind, descriptor.id, descriptor.title, descriptor.version, device
        );
        let paths = session.schedule(descriptor);
        self.publish(device, &session);
        paths
    }

    /// A read issued for `path` has completed
    pub async fn on_observation_resolved(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
        path: &ResourcePath,
    ) -> Resolution {
        let Some(handle) = self.registry.get(device, kind) else {
            return Resolution::NoSession;
        };

        let evaluation = {
            let mut session = handle.lock().await;
            match session.resolve(path) {
                PathResolution::Stale => {
                    debug!("Ignoring stale observation {} for {}", path, device);
                    return Resolution::Stale;
                }
                PathResolution::Awaiting(remaining) => {
                    debug!("{} resolved for {}, {} reads outstanding", path, device, remaining);
                    return Resolution::Awaiting { remaining };
                }
                PathResolution::Emptied => self.evaluate(device, &mut session),
            }
        };

        self.run(device, kind, evaluation)
    }

    /// Re-evaluate whether a push should start, without resolving any path
    pub async fn reconsider(&self, device: &DeviceId, kind: UpdateKind) -> Resolution {
        let Some(handle) = self.registry.get(device, kind) else {
            return Resolution::NoSession;
        };

        let evaluation = {
            let mut session = handle.lock().await;
            if !session.pending().is_empty() {
                return Resolution::Awaiting {
                    remaining: session.pending().len(),
                };
            }
            self.evaluate(device, &mut session)
        };

        self.run(device, kind, evaluation)
    }

    /// The device reported a new state or result value.
    ///
    /// Returns the new status when the report moved the session forward.
    /// Reports arriving while scheduled reads are outstanding only form the
    /// baseline for the trigger and are not applied.
    pub async fn on_status_reported(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
    ) -> Option<LifecycleStatus> {
        let handle = self.registry.get(device, kind)?;
        let mut session = handle.lock().await;
        if !session.pending().is_empty() {
            return None;
        }

        let snapshot = self.observations.snapshot(device)?;
        let state = snapshot.integer(&kind.state_path())?;
        let result = snapshot.integer(&kind.result_path())?;

        let mapping = map_status(kind, state, result);
        debug!(
            "{} {} reported state {} result {}: {:?}",
            device, kind, state, result, mapping
        );

        if !session.apply_report(mapping) {
            return None;
        }
        self.publish(device, &session);
        Some(session.status())
    }

    pub async fn current_lifecycle_status(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
    ) -> Option<LifecycleStatus> {
        let handle = self.registry.get(device, kind)?;
        let session = handle.lock().await;
        Some(session.status())
    }

    pub async fn session_summary(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
    ) -> Option<SessionSummary> {
        let handle = self.registry.get(device, kind)?;
        let session = handle.lock().await;
        Some(session.summary())
    }

    /// Drop every session of a deregistered device
    pub fn remove_device(&self, device: &DeviceId) -> usize {
        let removed = self.registry.remove_device(device);
        if removed > 0 {
            info!("Removed {} update sessions of {}", removed, device);
        }
        removed
    }

    /// Fail pushes that made no progress within the session timeout
    pub async fn expire_stale_sessions(&self, now: Instant) -> usize {
        let mut expired = 0;

        for ((device, kind), handle) in self.registry.all() {
            let mut session = handle.lock().await;
            if session.status() != LifecycleStatus::Downloading {
                continue;
            }

            let idle = session.idle_for(now);
            if idle < self.settings.session_timeout {
                continue;
            }

            warn!("{} push to {} stalled for {:?}, failing it", kind, device, idle);
            if session.fail(format!("no delivery progress for {}s", idle.as_secs())) {
                self.publish(&device, &session);
                expired += 1;
            }
        }

        expired
    }

    fn evaluate(&self, device: &DeviceId, session: &mut UpdateSession) -> Evaluation {
        if session.is_write_in_flight() {
            debug!("{} write to {} still in flight", session.kind(), device);
            return Evaluation::Done(Resolution::InFlight);
        }

        let snapshot = self.observations.snapshot(device).unwrap_or_default();

        // A delivered push is only repeated when the device or the transport
        // reported a failure
        if session.status().is_in_progress()
            && session.dispatch_error().is_none()
            && !retry_requested(session.kind(), &snapshot)
        {
            debug!(
                "{} push to {} already {}",
                session.kind(),
                device,
                session.status()
            );
            return Evaluation::Done(Resolution::NotTriggered);
        }

        if !should_start(session.kind(), session.current(), &snapshot) {
            return Evaluation::Done(Resolution::NotTriggered);
        }

        if session.current().is_none() {
            warn!(
                "{} reports a failed {} update but no package is scheduled",
                device,
                session.kind()
            );
            return Evaluation::Done(Resolution::NoPackage);
        }

        let evaluation = match start_push(session, self.chunks.as_ref(), &self.settings) {
            Ok(prepared) => Evaluation::Push(prepared),
            Err(e) => Evaluation::Done(Resolution::Failed {
                reason: e.to_string(),
            }),
        };
        self.publish(device, session);
        evaluation
    }

    fn run(&self, device: &DeviceId, kind: UpdateKind, evaluation: Evaluation) -> Resolution {
        let prepared = match evaluation {
            Evaluation::Push(prepared) => prepared,
            Evaluation::Done(resolution) => return resolution,
        };

        let chunk_index = prepared.request.chunk_index;
        let orchestrator = self.clone();
        let device = device.clone();
        let handle = tokio::spawn(async move {
            orchestrator.deliver(device, kind, prepared).await;
        });

        Resolution::Dispatched {
            chunk_index,
            handle,
        }
    }

    async fn deliver(&self, device: DeviceId, kind: UpdateKind, first: PreparedWrite) {
        let mut next = Some(first);
        while let Some(prepared) = next.take() {
            let outcome = self.send(&device, &prepared.request).await;
            next = self
                .complete_write(&device, kind, prepared.attempt, outcome)
                .await;
        }
    }

    async fn send(&self, device: &DeviceId, request: &WriteRequest) -> Result<(), OtaError> {
        debug!(
            "Writing chunk {} ({} bytes) to {}{}",
            request.chunk_index,
            request.payload.len(),
            device,
            request.path
        );
        match tokio::time::timeout(request.timeout, self.dispatcher.write(device, request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OtaError::DispatchTimeout(request.timeout)),
        }
    }

    async fn complete_write(
        &self,
        device: &DeviceId,
        kind: UpdateKind,
        attempt: u64,
        outcome: Result<(), OtaError>,
    ) -> Option<PreparedWrite> {
        let handle = self.registry.get(device, kind)?;
        let mut session = handle.lock().await;
        session.write_answered();

        if session.attempt() != attempt {
            debug!("Dropping write completion of superseded {} push to {}", kind, device);
            return None;
        }

        if let Err(e) = outcome {
            warn!("{} write to {} not confirmed: {}", kind, device, e);
            session.record_dispatch_failure(e.to_string());
            return None;
        }

        match continue_push(&mut session, self.chunks.as_ref(), &self.settings) {
            Ok(Some(next)) => Some(next),
            Ok(None) => {
                info!("{} package delivered to {}", kind, device);
                None
            }
            Err(_) => {
                self.publish(device, &session);
                None
            }
        }
    }

    fn publish(&self, device: &DeviceId, session: &UpdateSession) {
        let status = session.status();
        let reason = if status == LifecycleStatus::Failed {
            session.last_error().map(str::to_string)
        } else {
            None
        };

        self.telemetry.publish(StatusEvent::new(
            device.clone(),
            session.kind(),
            session.current().map(|p| p.id),
            status,
            reason,
        ));
    }
}
