//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::OtaError;
use crate::lwm2m::{DeviceId, ResourcePath, ResourceValue};
use crate::ota::kind::UpdateKind;
use crate::ota::orchestrator::Resolution;
use crate::ota::package::PackageDescriptor;
use crate::ota::status::LifecycleStatus;
use crate::server::state::ServerState;
use crate::utils::version_info;

type HandlerError = (StatusCode, String);

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "fotad".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Schedule response
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub device: DeviceId,
    pub kind: UpdateKind,
    pub package_id: String,

    /// Paths read from the device before the push is evaluated
    pub pending: Vec<ResourcePath>,

    /// Reads the transport refused to issue
    pub failed_reads: usize,
}

/// Schedule a package for a device
pub async fn schedule_handler(
    State(state): State<Arc<ServerState>>,
    Path((device, kind)): Path<(String, String)>,
    Json(descriptor): Json<PackageDescriptor>,
) -> Result<impl IntoResponse, HandlerError> {
    let kind = parse_kind(&kind)?;
    let device = DeviceId::new(device);
    let package_key = descriptor.key();

    if !state.packages.contains(&package_key) {
        let path = state.package_file(&package_key);
        state
            .packages
            .load_file(&package_key, &path, descriptor.checksum.as_deref())
            .await
            .map_err(package_error)?;
    }

    let stored = state
        .packages
        .get_entry(&package_key)
        .map(|entry| entry.data.len() as u64);
    if let Some(stored) = stored.filter(|stored| *stored != descriptor.size) {
        return Err(package_error(OtaError::PackageSizeMismatch {
            package_id: package_key,
            declared: descriptor.size,
            stored,
        }));
    }

    let pending = state
        .orchestrator
        .schedule_update(&device, kind, descriptor)
        .await;

    let reads = pending
        .iter()
        .map(|path| state.reader.read(&device, path));
    let failed_reads = join_all(reads)
        .await
        .into_iter()
        .zip(pending.iter())
        .filter_map(|(result, path)| result.err().map(|e| (path, e)))
        .inspect(|(path, e)| warn!("Read of {}{} not issued: {}", device, path, e))
        .count();

    Ok((
        StatusCode::ACCEPTED,
        Json(ScheduleResponse {
            device,
            kind,
            package_id: package_key,
            pending,
            failed_reads,
        }),
    ))
}

/// Session summary handler
pub async fn session_handler(
    State(state): State<Arc<ServerState>>,
    Path((device, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let kind = parse_kind(&kind)?;
    let device = DeviceId::new(device);

    state
        .orchestrator
        .session_summary(&device, kind)
        .await
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("No {} session for {}", kind, device),
            )
        })
}

/// Observation reported by the transport
#[derive(Debug, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub path: ResourcePath,
    pub value: ResourceValue,
}

/// Observation response
#[derive(Debug, Serialize, Deserialize)]
pub struct ObservationResponse {
    pub kind: Option<UpdateKind>,
    pub resolution: Option<String>,
    pub chunk_index: Option<usize>,

    /// Set when the report moved the session forward
    pub status: Option<LifecycleStatus>,
}

/// Observation handler
pub async fn observation_handler(
    State(state): State<Arc<ServerState>>,
    Path(device): Path<String>,
    Json(observation): Json<ObservationRequest>,
) -> impl IntoResponse {
    let device = DeviceId::new(device);
    let path = observation.path;
    state.observations.record(&device, path, observation.value);

    let Some(kind) = UpdateKind::from_object_id(path.object) else {
        return Json(ObservationResponse {
            kind: None,
            resolution: None,
            chunk_index: None,
            status: None,
        });
    };

    let mut resolution = state
        .orchestrator
        .on_observation_resolved(&device, kind, &path)
        .await;

    // A fresh state or result outside a scheduled read may call for a retry
    if matches!(resolution, Resolution::Stale) && kind.is_status_path(&path) {
        resolution = state.orchestrator.reconsider(&device, kind).await;
    }
    let chunk_index = match &resolution {
        Resolution::Dispatched { chunk_index, .. } => Some(*chunk_index),
        _ => None,
    };

    // Values that just triggered a push describe the device before it
    let status = if kind.is_status_path(&path) && !resolution.is_dispatched() {
        state.orchestrator.on_status_reported(&device, kind).await
    } else {
        None
    };

    Json(ObservationResponse {
        kind: Some(kind),
        resolution: Some(resolution.name().to_string()),
        chunk_index,
        status,
    })
}

/// Deregistration response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeregisterResponse {
    pub removed_sessions: usize,
}

/// Device deregistration handler
pub async fn deregister_handler(
    State(state): State<Arc<ServerState>>,
    Path(device): Path<String>,
) -> impl IntoResponse {
    let device = DeviceId::new(device);
    let removed_sessions = state.orchestrator.remove_device(&device);
    state.observations.forget(&device);
    info!("Device {} deregistered", device);

    Json(DeregisterResponse { removed_sessions })
}

fn parse_kind(kind: &str) -> Result<UpdateKind, HandlerError> {
    kind.parse().map_err(|e| (StatusCode::BAD_REQUEST, e))
}

fn package_error(e: OtaError) -> HandlerError {
    let status = match &e {
        OtaError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND
        }
        OtaError::ChecksumMismatch { .. } | OtaError::PackageSizeMismatch { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Cannot load package: {}", e);
    (status, e.to_string())
}
