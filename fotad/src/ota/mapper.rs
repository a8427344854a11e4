//! Mapping of device-reported (state, result) pairs onto lifecycle statuses
//!
//! The tables cover every code the Firmware Update (5) and Software
//! Management (9) objects define. A pair outside them maps to a failure with
//! a diagnostic instead of being dropped.

use crate::errors::OtaError;
use crate::ota::kind::UpdateKind;
use crate::ota::status::LifecycleStatus;

/// Value a device reports for a resource it cannot fill in yet
const UNKNOWN: i64 = -1;

/// Outcome of mapping a device report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMapping {
    /// Progress on the happy path
    Status(LifecycleStatus),

    /// Attempt failed, with a diagnostic reason
    Failed(String),

    /// Device does not know its state yet
    Unknown,
}

/// Map a (state, result) pair reported for `kind`
pub fn map_status(kind: UpdateKind, state: i64, result: i64) -> StatusMapping {
    let (error, status) = match kind {
        UpdateKind::Firmware => (firmware_error(result), firmware_status(state, result)),
        UpdateKind::Software => (software_error(result), software_status(state, result)),
    };

    if let Some(reason) = error {
        return StatusMapping::Failed(reason.to_string());
    }
    if state == UNKNOWN || result == UNKNOWN {
        return StatusMapping::Unknown;
    }

    match status {
        Some(status) => StatusMapping::Status(status),
        None => StatusMapping::Failed(
            OtaError::UnrecognizedStatusCode {
                kind: kind.to_string(),
                state,
                result,
            }
            .to_string(),
        ),
    }
}

fn firmware_error(result: i64) -> Option<&'static str> {
    match result {
        2 => Some("Not enough flash memory for the new firmware package"),
        3 => Some("Out of RAM during downloading process"),
        4 => Some("Connection lost during downloading process"),
        5 => Some("Integrity check failure for new downloaded package"),
        6 => Some("Unsupported package type"),
        7 => Some("Invalid URI"),
        8 => Some("Firmware update failed"),
        9 => Some("Unsupported protocol"),
        _ => None,
    }
}

fn firmware_status(state: i64, result: i64) -> Option<LifecycleStatus> {
    match (state, result) {
        (0, 0) => Some(LifecycleStatus::Idle),
        (0, 1) => Some(LifecycleStatus::Updated),
        (1, 0 | 1) => Some(LifecycleStatus::Downloading),
        (2, 0 | 1) => Some(LifecycleStatus::Downloaded),
        (3, 0 | 1) => Some(LifecycleStatus::Updating),
        _ => None,
    }
}

fn software_error(result: i64) -> Option<&'static str> {
    match result {
        50 => Some("Not enough storage for the new software package"),
        51 => Some("Out of memory during downloading process"),
        52 => Some("Connection lost during downloading process"),
        53 => Some("Package integrity check failure"),
        54 => Some("Unsupported package type"),
        56 => Some("Invalid URI"),
        57 => Some("Device defined update error"),
        58 => Some("Software installation failure"),
        59 => Some("Uninstallation failure"),
        _ => None,
    }
}

fn software_status(state: i64, result: i64) -> Option<LifecycleStatus> {
    match (state, result) {
        (0, 0) => Some(LifecycleStatus::Idle),
        (1, 0 | 1) => Some(LifecycleStatus::Downloading),
        (2, 0 | 1) => Some(LifecycleStatus::Downloaded),
        (2, 3) | (3, 0 | 3) => Some(LifecycleStatus::Verified),
        (4, 0 | 2) => Some(LifecycleStatus::Updated),
        _ => None,
    }
}
