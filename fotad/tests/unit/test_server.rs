//! HTTP server unit tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use fotad::lwm2m::DeviceId;
use fotad::ota::kind::UpdateKind;
use fotad::ota::package::PackageDescriptor;
use fotad::ota::status::LifecycleStatus;
use fotad::server::handlers::{DeregisterResponse, ObservationResponse, ScheduleResponse};
use fotad::server::serve::router;
use fotad::server::state::ServerState;
use fotad::utils::sha256_hash;

use crate::support::{settings, uncached_package, DispatchMode, Harness, RecordingReader};

const FIRMWARE: UpdateKind = UpdateKind::Firmware;

struct TestServer {
    base_url: String,
    harness: Harness,
    reader: Arc<RecordingReader>,
    package_dir: PathBuf,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let harness = Harness::new(DispatchMode::Ack, settings(0));
        let reader = Arc::new(RecordingReader::default());
        let package_dir = std::env::temp_dir().join(format!("fotad-pkgs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&package_dir).unwrap();

        let state = Arc::new(ServerState::new(
            harness.orchestrator.clone(),
            harness.observations.clone(),
            harness.packages.clone(),
            reader.clone(),
            package_dir.clone(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            harness,
            reader,
            package_dir,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Store a package binary where the server looks for it
    fn stage_package(&self, data: &[u8], title: &str, version: &str) -> PackageDescriptor {
        let package = uncached_package(data.len() as u64, title, version)
            .with_checksum(sha256_hash(data));
        let path = self.package_dir.join(format!("{}.bin", package.key()));
        std::fs::write(path, data).unwrap();
        package
    }

    /// Wait until the device's firmware session has no unanswered write
    async fn wait_until_answered(&self, device: &str) {
        let device = DeviceId::new(device);
        let wait = async {
            loop {
                let summary = self
                    .harness
                    .orchestrator
                    .session_summary(&device, FIRMWARE)
                    .await;
                if summary.is_some_and(|s| !s.write_in_flight) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("write was not answered in time");
    }

    /// Report a full firmware status, leaving the state for last
    async fn report_firmware(&self, device: &str, state: i64, result: i64, version: &str) -> ObservationResponse {
        self.observe(device, "/5/0/6", json!("fw-a")).await;
        self.observe(device, "/5/0/7", json!(version)).await;
        self.observe(device, "/5/0/5", json!(result)).await;
        self.observe(device, "/5/0/3", json!(state)).await
    }

    async fn schedule(&self, device: &str, kind: &str, package: &PackageDescriptor) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/devices/{}/updates/{}", device, kind)))
            .json(package)
            .send()
            .await
            .unwrap()
    }

    async fn observe(&self, device: &str, path: &str, value: Value) -> ObservationResponse {
        let response = self
            .client
            .post(self.url(&format!("/devices/{}/observations", device)))
            .json(&json!({ "path": path, "value": value }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.package_dir);
    }
}

#[tokio::test]
async fn test_health_and_version() {
    let server = TestServer::start().await;

    let health: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "fotad");

    let version: Value = server
        .client
        .get(server.url("/version"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_schedule_issues_reads() {
    let server = TestServer::start().await;
    let package = server.stage_package(b"firmware 1.2", "fw-a", "1.2");

    let response = server.schedule("dev-1", "firmware", &package).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body: ScheduleResponse = response.json().await.unwrap();
    assert_eq!(body.kind, UpdateKind::Firmware);
    assert_eq!(body.pending.len(), 4);
    assert_eq!(body.failed_reads, 0);
    assert_eq!(body.package_id, package.key());

    let reads = server.reader.reads();
    assert_eq!(reads.len(), 4);
    assert!(reads.iter().all(|(device, _)| device == &DeviceId::new("dev-1")));
    assert!(server.harness.packages.contains(&package.key()));

    let session: Value = server
        .client
        .get(server.url("/devices/dev-1/updates/fw"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["status"], "IDLE");
    assert_eq!(session["package_version"], "1.2");
    assert_eq!(session["pending"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_schedule_rejects_bad_requests() {
    let server = TestServer::start().await;

    let missing = uncached_package(16, "fw-a", "1.2");
    let response = server.schedule("dev-1", "firmware", &missing).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let staged = server.stage_package(b"firmware", "fw-a", "1.2");
    let response = server.schedule("dev-1", "bootloader", &staged).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let tampered = staged.clone().with_checksum(sha256_hash(b"other"));
    let response = server.schedule("dev-1", "firmware", &tampered).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert!(server.reader.reads().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/devices/dev-9/updates/software"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_observations_drive_push() {
    let server = TestServer::start().await;
    let package = server.stage_package(b"firmware 1.2", "fw-a", "1.2");
    server.schedule("dev-1", "firmware", &package).await;

    let name = server.observe("dev-1", "/5/0/6", json!("fw-a")).await;
    assert_eq!(name.kind, Some(UpdateKind::Firmware));
    assert_eq!(name.resolution.as_deref(), Some("awaiting"));

    // Object-versioned path addresses the same resource
    server.observe("dev-1", "/5_1.0/0/7", json!("1.1")).await;
    server.observe("dev-1", "/5/0/5", json!(1)).await;
    let state = server.observe("dev-1", "/5/0/3", json!(0)).await;
    assert_eq!(state.resolution.as_deref(), Some("dispatched"));
    assert_eq!(state.chunk_index, Some(0));

    server.harness.dispatcher.wait_for_writes(1).await;
    let writes = server.harness.dispatcher.writes();
    assert_eq!(writes[0].1.payload, b"firmware 1.2".to_vec());
    server.wait_until_answered("dev-1").await;

    // Device reports the download finished
    let downloaded = server.observe("dev-1", "/5/0/3", json!(2)).await;
    assert_eq!(downloaded.resolution.as_deref(), Some("not_triggered"));
    assert_eq!(downloaded.status, Some(LifecycleStatus::Downloaded));
}

#[tokio::test]
async fn test_observation_outside_update_objects() {
    let server = TestServer::start().await;

    let response = server.observe("dev-1", "/3/0/0", json!("Acme")).await;
    assert!(response.kind.is_none());
    assert!(response.resolution.is_none());
    assert_eq!(server.harness.observations.len(), 1);
}

#[tokio::test]
async fn test_deregister_device() {
    let server = TestServer::start().await;
    let package = server.stage_package(b"firmware", "fw-a", "1.2");
    server.schedule("dev-1", "firmware", &package).await;
    server.observe("dev-1", "/5/0/3", json!(0)).await;

    let response: DeregisterResponse = server
        .client
        .delete(server.url("/devices/dev-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response.removed_sessions, 1);
    assert!(server.harness.observations.is_empty());

    let response = server
        .client
        .get(server.url("/devices/dev-1/updates/firmware"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_result_observation_retries_push() {
    let server = TestServer::start().await;
    server
        .harness
        .dispatcher
        .set_mode(DispatchMode::Fail("link down".to_string()));
    let package = server.stage_package(b"firmware 1.2", "fw-a", "1.2");
    server.schedule("dev-1", "firmware", &package).await;

    let first = server.report_firmware("dev-1", 0, 1, "1.1").await;
    assert_eq!(first.resolution.as_deref(), Some("dispatched"));
    server.harness.dispatcher.wait_for_writes(1).await;
    server.wait_until_answered("dev-1").await;

    let summary = server
        .harness
        .orchestrator
        .session_summary(&DeviceId::new("dev-1"), FIRMWARE)
        .await
        .unwrap();
    assert_eq!(summary.last_error.as_deref(), Some("Dispatch failure: link down"));

    // Device reports a lost connection on its own
    server.harness.dispatcher.set_mode(DispatchMode::Ack);
    let retry = server.observe("dev-1", "/5/0/5", json!(4)).await;
    assert_eq!(retry.resolution.as_deref(), Some("dispatched"));
    assert_eq!(retry.chunk_index, Some(0));

    server.harness.dispatcher.wait_for_writes(2).await;
    assert_eq!(server.harness.dispatcher.write_count(), 2);
}

#[tokio::test]
async fn test_progress_reports_do_not_repeat_delivery() {
    let server = TestServer::start().await;
    let package = server.stage_package(b"firmware 1.2", "fw-a", "1.2");
    server.schedule("dev-1", "firmware", &package).await;

    let first = server.report_firmware("dev-1", 0, 1, "1.1").await;
    assert_eq!(first.resolution.as_deref(), Some("dispatched"));
    server.harness.dispatcher.wait_for_writes(1).await;
    server.wait_until_answered("dev-1").await;

    let downloading = server.observe("dev-1", "/5/0/3", json!(1)).await;
    assert_eq!(downloading.resolution.as_deref(), Some("not_triggered"));

    let cleared = server.observe("dev-1", "/5/0/5", json!(0)).await;
    assert_eq!(cleared.resolution.as_deref(), Some("not_triggered"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.harness.dispatcher.write_count(), 1);
    assert_eq!(
        server
            .harness
            .orchestrator
            .current_lifecycle_status(&DeviceId::new("dev-1"), FIRMWARE)
            .await,
        Some(LifecycleStatus::Downloading)
    );
}

#[tokio::test]
async fn test_schedule_rejects_declared_size_mismatch() {
    let server = TestServer::start().await;
    let data = b"firmware 1.2";
    let package = uncached_package(4, "fw-a", "1.2").with_checksum(sha256_hash(data));
    let path = server.package_dir.join(format!("{}.bin", package.key()));
    std::fs::write(path, data).unwrap();

    let response = server.schedule("dev-1", "firmware", &package).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = response.text().await.unwrap();
    assert!(body.contains("12 bytes"));
    assert!(server.reader.reads().is_empty());
    assert!(server
        .harness
        .orchestrator
        .session_summary(&DeviceId::new("dev-1"), FIRMWARE)
        .await
        .is_none());
}
