//! Update lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical update status reported to telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// No push in progress
    Idle,

    /// Package chunks are being written to the device
    Downloading,

    /// Device holds the whole package
    Downloaded,

    /// Device verified the package
    Verified,

    /// Device is applying the package
    Updating,

    /// Device runs the new package
    Updated,

    /// Attempt failed
    Failed,
}

impl LifecycleStatus {
    /// Position along the happy path; `Failed` sits outside it
    fn rank(&self) -> Option<u8> {
        match self {
            LifecycleStatus::Idle => Some(0),
            LifecycleStatus::Downloading => Some(1),
            LifecycleStatus::Downloaded => Some(2),
            LifecycleStatus::Verified => Some(3),
            LifecycleStatus::Updating => Some(4),
            LifecycleStatus::Updated => Some(5),
            LifecycleStatus::Failed => None,
        }
    }

    /// A push was started and the device has not settled yet
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::Downloading
                | LifecycleStatus::Downloaded
                | LifecycleStatus::Verified
                | LifecycleStatus::Updating
        )
    }

    /// Terminal for the current package
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Updated | LifecycleStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Idle => "IDLE",
            LifecycleStatus::Downloading => "DOWNLOADING",
            LifecycleStatus::Downloaded => "DOWNLOADED",
            LifecycleStatus::Verified => "VERIFIED",
            LifecycleStatus::Updating => "UPDATING",
            LifecycleStatus::Updated => "UPDATED",
            LifecycleStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// A push (first chunk of a fresh cycle) was issued
    PushStarted,

    /// Device reported progress mapped onto a status
    Reported(LifecycleStatus),

    /// Attempt failed
    Failed(String),

    /// A new package was scheduled
    Reset,
}

/// Lifecycle FSM for one update session
#[derive(Debug, Clone)]
pub struct LifecycleFsm {
    status: LifecycleStatus,
    reason: Option<String>,
}

impl LifecycleFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            status: LifecycleStatus::Idle,
            reason: None,
        }
    }

    /// Get current status
    pub fn status(&self) -> LifecycleStatus {
        self.status
    }

    /// Diagnostic reason of the last failure
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Process an event.
    ///
    /// Returns whether the status changed. Regressions and moves out of a
    /// terminal status (other than a fresh push or a reset) are rejected.
    pub fn process(&mut self, event: LifecycleEvent) -> Result<bool, String> {
        let new_status = match (&self.status, &event) {
            // A fresh cycle overwrites whatever the previous package ended in
            (_, LifecycleEvent::PushStarted) => {
                self.reason = None;
                LifecycleStatus::Downloading
            }
            (_, LifecycleEvent::Reset) => {
                self.reason = None;
                LifecycleStatus::Idle
            }

            (status, LifecycleEvent::Failed(_)) if status.is_terminal() => {
                return if *status == LifecycleStatus::Failed {
                    Ok(false)
                } else {
                    Err(format!("Invalid transition: {:?} -> {:?}", status, event))
                };
            }
            (_, LifecycleEvent::Failed(reason)) => {
                self.reason = Some(reason.clone());
                LifecycleStatus::Failed
            }

            (status, LifecycleEvent::Reported(reported)) if status == reported => return Ok(false),
            (status, LifecycleEvent::Reported(LifecycleStatus::Failed)) if !status.is_terminal() => {
                self.reason = Some("device reported failure".to_string());
                LifecycleStatus::Failed
            }
            (status, LifecycleEvent::Reported(reported))
                if !status.is_terminal() && reported.rank() > status.rank() =>
            {
                *reported
            }

            // Regressions and moves out of terminal states
            (status, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", status, event));
            }
        };

        let changed = new_status != self.status;
        self.status = new_status;
        Ok(changed)
    }
}

impl Default for LifecycleFsm {
    fn default() -> Self {
        Self::new()
    }
}
