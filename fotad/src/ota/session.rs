//! Per-device, per-kind update session

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::lwm2m::ResourcePath;
use crate::ota::delivery::ChunkCursor;
use crate::ota::kind::UpdateKind;
use crate::ota::mapper::StatusMapping;
use crate::ota::package::PackageDescriptor;
use crate::ota::pending::PendingObservations;
use crate::ota::status::{LifecycleEvent, LifecycleFsm, LifecycleStatus};

/// What resolving an observed path did to the pending set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathResolution {
    /// Path was not pending
    Stale,

    /// Other paths are still outstanding
    Awaiting(usize),

    /// This path was the last one outstanding
    Emptied,
}

/// Update session state
///
/// Owned by the session registry behind a per-session lock; every method
/// here assumes the caller holds it.
#[derive(Debug)]
pub struct UpdateSession {
    kind: UpdateKind,
    current: Option<PackageDescriptor>,
    lifecycle: LifecycleFsm,
    pending: PendingObservations,
    cursor: Option<ChunkCursor>,
    attempt: u64,
    write_in_flight: bool,
    last_activity: Instant,
    last_error: Option<String>,
}

impl UpdateSession {
    pub fn new(kind: UpdateKind) -> Self {
        Self {
            kind,
            current: None,
            lifecycle: LifecycleFsm::new(),
            pending: PendingObservations::new(),
            cursor: None,
            attempt: 0,
            write_in_flight: false,
            last_activity: Instant::now(),
            last_error: None,
        }
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn current(&self) -> Option<&PackageDescriptor> {
        self.current.as_ref()
    }

    pub fn status(&self) -> LifecycleStatus {
        self.lifecycle.status()
    }

    /// Failure diagnostic, or the last dispatch error of an ongoing push
    pub fn last_error(&self) -> Option<&str> {
        self.lifecycle.reason().or(self.last_error.as_deref())
    }

    pub fn pending(&self) -> &PendingObservations {
        &self.pending
    }

    pub fn cursor(&self) -> Option<&ChunkCursor> {
        self.cursor.as_ref()
    }

    /// Generation of the current push; completions carrying an older one are stale
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// A write was handed to the dispatcher and has not been answered yet,
    /// whichever attempt it belongs to
    pub fn is_write_in_flight(&self) -> bool {
        self.write_in_flight
    }

    /// Error of the last unconfirmed write of the ongoing push
    pub fn dispatch_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Install a new package and re-arm the reads needed before evaluation.
    ///
    /// A write already handed to the dispatcher stays outstanding; its
    /// completion is discarded through the attempt generation.
    pub fn schedule(&mut self, descriptor: PackageDescriptor) -> Vec<ResourcePath> {
        self.current = Some(descriptor);
        self.cursor = None;
        self.last_error = None;
        self.attempt += 1;
        self.process(LifecycleEvent::Reset);
        self.pending.rearm(self.kind.observed_paths());
        self.touch();
        self.pending.paths()
    }

    pub fn resolve(&mut self, path: &ResourcePath) -> PathResolution {
        if !self.pending.contains(path) {
            return PathResolution::Stale;
        }
        if self.pending.resolve(path) {
            PathResolution::Emptied
        } else {
            PathResolution::Awaiting(self.pending.len())
        }
    }

    /// Record the first write of a fresh push; returns its attempt
    pub fn begin_push(&mut self, cursor: ChunkCursor) -> u64 {
        self.process(LifecycleEvent::PushStarted);
        self.attempt += 1;
        self.cursor = Some(cursor);
        self.write_in_flight = true;
        self.last_error = None;
        self.touch();
        self.attempt
    }

    /// Move the cursor past an acknowledged chunk.
    ///
    /// Returns false once the last chunk has been acknowledged.
    pub fn advance_cursor(&mut self) -> bool {
        self.touch();
        match self.cursor.as_mut() {
            Some(cursor) => cursor.advance(),
            None => false,
        }
    }

    pub fn mark_write_in_flight(&mut self) {
        self.write_in_flight = true;
    }

    /// The dispatcher answered the outstanding write
    pub fn write_answered(&mut self) {
        self.write_in_flight = false;
    }

    /// A write of the current push could not be confirmed; status stays as is
    pub fn record_dispatch_failure(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
    }

    /// Force the session into `Failed`, abandoning the push.
    ///
    /// An outstanding write keeps the session busy until it is answered.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.cursor = None;
        self.attempt += 1;
        self.process(LifecycleEvent::Failed(reason.into()))
    }

    /// Apply a device report through the lifecycle state machine.
    ///
    /// Returns whether the status changed. Regressions are ignored.
    pub fn apply_report(&mut self, mapping: StatusMapping) -> bool {
        let event = match mapping {
            StatusMapping::Status(status) => LifecycleEvent::Reported(status),
            StatusMapping::Failed(reason) => LifecycleEvent::Failed(reason),
            StatusMapping::Unknown => return false,
        };

        match self.lifecycle.process(event) {
            Ok(changed) => {
                if changed {
                    self.touch();
                    if self.status() == LifecycleStatus::Failed {
                        self.cursor = None;
                        self.attempt += 1;
                    }
                }
                changed
            }
            Err(e) => {
                debug!("Ignoring {} report: {}", self.kind, e);
                false
            }
        }
    }

    fn process(&mut self, event: LifecycleEvent) -> bool {
        match self.lifecycle.process(event) {
            Ok(changed) => changed,
            Err(e) => {
                debug!("{} lifecycle unchanged: {}", self.kind, e);
                false
            }
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the session last made progress
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            kind: self.kind,
            status: self.status(),
            package_id: self.current.as_ref().map(|p| p.id),
            package_title: self.current.as_ref().and_then(|p| p.title.clone()),
            package_version: self.current.as_ref().and_then(|p| p.version.clone()),
            pending: self.pending.paths(),
            chunk_index: self.cursor.as_ref().map(ChunkCursor::index),
            chunk_count: self.cursor.as_ref().map(ChunkCursor::chunk_count),
            write_in_flight: self.write_in_flight,
            last_error: self.last_error().map(str::to_string),
        }
    }
}

/// Reporting view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub kind: UpdateKind,
    pub status: LifecycleStatus,
    pub package_id: Option<Uuid>,
    pub package_title: Option<String>,
    pub package_version: Option<String>,
    pub pending: Vec<ResourcePath>,
    pub chunk_index: Option<usize>,
    pub chunk_count: Option<usize>,
    pub write_in_flight: bool,
    pub last_error: Option<String>,
}
