//! HTTP bridge to the LwM2M server

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::OtaError;
use crate::lwm2m::{ContentFormat, DeviceId, ResourcePath};
use crate::ota::delivery::{Dispatcher, WriteRequest};

/// Body of a write request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBody {
    pub path: ResourcePath,
    pub content_format: ContentFormat,

    /// Base64 encoded payload
    pub payload: String,
    pub timeout_ms: u64,
}

impl WriteBody {
    pub fn from_request(request: &WriteRequest) -> Self {
        Self {
            path: request.path,
            content_format: request.content_format,
            payload: BASE64.encode(&request.payload),
            timeout_ms: request.timeout.as_millis() as u64,
        }
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, OtaError> {
        BASE64
            .decode(&self.payload)
            .map_err(|e| OtaError::DispatchFailure(format!("invalid payload encoding: {}", e)))
    }
}

/// Body of a read request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadBody {
    pub path: ResourcePath,
}

/// Read primitive of the device-management transport
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Ask for `path` to be read from the device.
    ///
    /// The value arrives later as an observation; this only confirms the
    /// read was issued.
    async fn read(&self, device: &DeviceId, path: &ResourcePath) -> Result<(), OtaError>;
}

/// Device-management transport speaking to the LwM2M server's REST API
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, OtaError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<(), OtaError> {
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST {} failed: {} - {}", url, status, body);
            return Err(OtaError::DispatchFailure(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl Dispatcher for HttpTransport {
    async fn write(&self, device: &DeviceId, request: &WriteRequest) -> Result<(), OtaError> {
        let url = format!("{}/devices/{}/write", self.base_url, device);
        debug!(
            "POST {} {} chunk {} ({} bytes)",
            url,
            request.path,
            request.chunk_index,
            request.payload.len()
        );

        self.post(&url, &WriteBody::from_request(request))
            .await
            .map_err(|e| match e {
                OtaError::HttpError(e) => OtaError::DispatchFailure(e.to_string()),
                other => other,
            })
    }
}

#[async_trait]
impl ResourceReader for HttpTransport {
    async fn read(&self, device: &DeviceId, path: &ResourcePath) -> Result<(), OtaError> {
        let url = format!("{}/devices/{}/read", self.base_url, device);
        debug!("POST {} {}", url, path);

        self.post(&url, &ReadBody { path: *path }).await
    }
}
