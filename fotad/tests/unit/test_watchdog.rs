//! Watchdog worker unit tests

use std::time::Duration;

use fotad::lwm2m::DeviceId;
use fotad::ota::delivery::DeliverySettings;
use fotad::ota::kind::UpdateKind;
use fotad::ota::status::LifecycleStatus;
use fotad::workers::watchdog;

use crate::support::{DispatchMode, Harness};

#[tokio::test]
async fn test_watchdog_sweeps_until_shutdown() {
    let h = Harness::new(
        DispatchMode::Gated,
        DeliverySettings {
            chunk_size: 0,
            write_timeout: Duration::from_secs(5),
            session_timeout: Duration::ZERO,
        },
    );
    let device = DeviceId::new("dev-1");
    let kind = UpdateKind::Firmware;
    let package = h.cached_package(b"firmware", "fw-a", "1.2");

    h.report_firmware(&device, 0, 1, "1.1", "fw-a");
    let paths = h.orchestrator.schedule_update(&device, kind, package).await;
    let resolution = h.resolve_all(&device, kind, &paths).await;
    assert!(resolution.is_dispatched());

    let options = watchdog::Options {
        interval: Duration::from_millis(5),
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        watchdog::run(
            &options,
            &h.orchestrator,
            tokio::time::sleep,
            Box::pin(tokio::time::sleep(Duration::from_millis(50))),
        ),
    )
    .await
    .unwrap();

    assert_eq!(
        h.orchestrator.current_lifecycle_status(&device, kind).await,
        Some(LifecycleStatus::Failed)
    );
    let last = h.telemetry.last().unwrap();
    assert_eq!(last.status, LifecycleStatus::Failed);
    assert!(last.reason.unwrap().contains("no delivery progress"));

    h.dispatcher.open_gate(1);
    resolution.join().await;
}
