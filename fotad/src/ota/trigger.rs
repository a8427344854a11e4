//! Conditional update start

use crate::observe::ResourceSnapshot;
use crate::ota::kind::UpdateKind;
use crate::ota::package::PackageDescriptor;

/// Firmware update result: success
const RESULT_SUCCESS: i64 = 1;

/// Value of a resource the device has not reported a meaningful value for
const UNKNOWN: i64 = -1;

/// Firmware state: idle
const STATE_IDLE: i64 = 0;

/// Decide whether a push should start for this device now.
///
/// Software packages are never pushed autonomously.
pub fn should_start(
    kind: UpdateKind,
    current: Option<&PackageDescriptor>,
    snapshot: &ResourceSnapshot,
) -> bool {
    match kind {
        UpdateKind::Firmware => should_start_firmware(current, snapshot),
        UpdateKind::Software => false,
    }
}

/// The device reports that its last attempt ended with an error
pub fn retry_requested(kind: UpdateKind, snapshot: &ResourceSnapshot) -> bool {
    match kind {
        UpdateKind::Firmware => snapshot
            .integer(&kind.result_path())
            .is_some_and(|result| result > RESULT_SUCCESS),
        UpdateKind::Software => false,
    }
}

fn should_start_firmware(current: Option<&PackageDescriptor>, snapshot: &ResourceSnapshot) -> bool {
    let kind = UpdateKind::Firmware;
    if retry_requested(kind, snapshot) {
        return true;
    }

    let Some(result) = snapshot.integer(&kind.result_path()) else {
        return false;
    };

    let Some(state) = snapshot.integer(&kind.state_path()) else {
        return false;
    };

    let idle = state == STATE_IDLE || state == UNKNOWN;
    let settled = result == RESULT_SUCCESS || result == UNKNOWN;

    idle && settled && current.is_some_and(|package| is_stale(package, snapshot, kind))
}

/// Device runs something other than the targeted package
fn is_stale(package: &PackageDescriptor, snapshot: &ResourceSnapshot, kind: UpdateKind) -> bool {
    differs(package.version.as_deref(), snapshot.string(&kind.version_path()))
        || differs(package.title.as_deref(), snapshot.string(&kind.name_path()))
}

/// An unset target or an unreported value never counts as a mismatch
fn differs(target: Option<&str>, reported: Option<&str>) -> bool {
    matches!((target, reported), (Some(target), Some(reported)) if target != reported)
}
