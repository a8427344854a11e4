//! Transport unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;

use fotad::errors::OtaError;
use fotad::lwm2m::{ContentFormat, DeviceId, ResourceValue};
use fotad::observe::ObservationStore;
use fotad::ota::delivery::{Dispatcher, WriteRequest};
use fotad::ota::kind::UpdateKind;
use fotad::ota::orchestrator::UpdateOrchestrator;
use fotad::transport::client::{ReadBody, WriteBody};
use fotad::transport::{HttpTransport, ResourceReader};

use crate::support::{settings, uncached_package, RecordingTelemetry};

/// Requests received by the fake LwM2M server
#[derive(Default)]
struct Received {
    writes: Mutex<Vec<(String, WriteBody)>>,
    reads: Mutex<Vec<(String, ReadBody)>>,
}

async fn write_handler(
    State(received): State<Arc<Received>>,
    Path(device): Path<String>,
    Json(body): Json<WriteBody>,
) -> StatusCode {
    if device == "offline" {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    received.writes.lock().unwrap().push((device, body));
    StatusCode::OK
}

async fn read_handler(
    State(received): State<Arc<Received>>,
    Path(device): Path<String>,
    Json(body): Json<ReadBody>,
) -> StatusCode {
    received.reads.lock().unwrap().push((device, body));
    StatusCode::ACCEPTED
}

async fn fake_lwm2m_server() -> (HttpTransport, Arc<Received>) {
    let received = Arc::new(Received::default());
    let app = Router::new()
        .route("/api/devices/{device}/write", post(write_handler))
        .route("/api/devices/{device}/read", post(read_handler))
        .with_state(received.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let transport =
        HttpTransport::new(&format!("http://{}/api/", addr), Duration::from_secs(5)).unwrap();
    (transport, received)
}

fn chunk_request(payload: &[u8]) -> WriteRequest {
    WriteRequest {
        path: UpdateKind::Firmware.package_path(),
        content_format: ContentFormat::Opaque,
        payload: payload.to_vec(),
        timeout: Duration::from_secs(10),
        chunk_index: 0,
    }
}

#[tokio::test]
async fn test_write_posts_encoded_chunk() {
    let (transport, received) = fake_lwm2m_server().await;
    let device = DeviceId::new("dev-1");

    transport
        .write(&device, &chunk_request(b"\x00\x01binary\xff"))
        .await
        .unwrap();

    let writes = received.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (target, body) = &writes[0];
    assert_eq!(target, "dev-1");
    assert_eq!(body.path, UpdateKind::Firmware.package_path());
    assert_eq!(body.content_format, ContentFormat::Opaque);
    assert_eq!(body.timeout_ms, 10_000);
    assert_eq!(body.decode_payload().unwrap(), b"\x00\x01binary\xff".to_vec());
}

#[tokio::test]
async fn test_rejected_write_is_dispatch_failure() {
    let (transport, received) = fake_lwm2m_server().await;

    let err = transport
        .write(&DeviceId::new("offline"), &chunk_request(b"chunk"))
        .await
        .unwrap_err();
    assert!(matches!(err, OtaError::DispatchFailure(_)));
    assert!(received.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_dispatch_failure() {
    let transport = HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();

    let err = transport
        .write(&DeviceId::new("dev-1"), &chunk_request(b"chunk"))
        .await
        .unwrap_err();
    assert!(matches!(err, OtaError::DispatchFailure(_)));
}

#[tokio::test]
async fn test_read_posts_path() {
    let (transport, received) = fake_lwm2m_server().await;
    let path = UpdateKind::Software.state_path();

    transport.read(&DeviceId::new("dev-2"), &path).await.unwrap();

    let reads = received.reads.lock().unwrap();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].0, "dev-2");
    assert_eq!(reads[0].1.path, path);
}

#[tokio::test]
async fn test_orchestrator_pushes_through_transport() {
    let (transport, received) = fake_lwm2m_server().await;
    let observations = Arc::new(ObservationStore::new());
    let packages = Arc::new(fotad::cache::package::PackageCache::new(4));
    let data: Vec<u8> = (0u8..=255).collect();

    let orchestrator = UpdateOrchestrator::new(
        observations.clone(),
        packages.clone(),
        Arc::new(transport),
        Arc::new(RecordingTelemetry::default()),
        settings(100),
    );

    let device = DeviceId::new("dev-1");
    let kind = UpdateKind::Firmware;
    let package = uncached_package(data.len() as u64, "fw-a", "1.2");
    packages.insert(package.key(), data.clone());

    observations.record(&device, kind.state_path(), ResourceValue::Integer(0));
    observations.record(&device, kind.result_path(), ResourceValue::Integer(1));
    observations.record(&device, kind.version_path(), ResourceValue::from("1.1"));

    let mut resolution = None;
    for path in orchestrator.schedule_update(&device, kind, package).await {
        resolution = Some(orchestrator.on_observation_resolved(&device, kind, &path).await);
    }
    resolution.unwrap().join().await;

    let writes = received.writes.lock().unwrap();
    assert_eq!(writes.len(), 3);
    let delivered: Vec<u8> = writes
        .iter()
        .flat_map(|(_, body)| body.decode_payload().unwrap())
        .collect();
    assert_eq!(delivered, data);
}
