//! Chunked package delivery

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::errors::{ChunkError, OtaError};
use crate::lwm2m::{ContentFormat, DeviceId, ResourcePath};
use crate::ota::package::PackageDescriptor;
use crate::ota::session::UpdateSession;

/// Keyed random-access source of package bytes.
///
/// Shared by every session pushing the same package, so implementations
/// must tolerate concurrent reads.
pub trait ChunkSource: Send + Sync {
    /// Fetch chunk `chunk_index` of `chunk_size` bytes; a chunk size of 0
    /// addresses the whole package as chunk 0
    fn get(&self, package_id: &str, chunk_size: usize, chunk_index: usize)
        -> Result<Vec<u8>, ChunkError>;

    /// Length in bytes of the stored package
    fn size(&self, package_id: &str) -> Result<u64, ChunkError>;
}

/// Write primitive of the device-management transport
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Issue one write request and wait for the device's acknowledgment
    async fn write(&self, device: &DeviceId, request: &WriteRequest) -> Result<(), OtaError>;
}

/// A single write request carrying one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub path: ResourcePath,
    pub content_format: ContentFormat,
    pub payload: Vec<u8>,
    pub timeout: Duration,
    pub chunk_index: usize,
}

/// Write prepared under the session lock, dispatched after releasing it
#[derive(Debug, Clone)]
pub struct PreparedWrite {
    pub attempt: u64,
    pub request: WriteRequest,
}

/// Chunking parameters
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Bytes per write; 0 sends the package in one write
    pub chunk_size: usize,

    /// Timeout handed to each write request
    pub write_timeout: Duration,

    /// A push that makes no progress for this long is failed by the watchdog
    pub session_timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            write_timeout: Duration::from_secs(10),
            session_timeout: Duration::from_secs(600),
        }
    }
}

/// Progress marker of a package push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCursor {
    package_key: String,
    package_size: u64,
    chunk_size: usize,
    index: usize,
}

impl ChunkCursor {
    pub fn new(package: &PackageDescriptor, chunk_size: usize) -> Self {
        Self {
            package_key: package.key(),
            package_size: package.size,
            chunk_size,
            index: 0,
        }
    }

    pub fn package_size(&self) -> u64 {
        self.package_size
    }

    pub fn package_key(&self) -> &str {
        &self.package_key
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn chunk_count(&self) -> usize {
        if self.chunk_size == 0 || self.package_size == 0 {
            return 1;
        }
        self.package_size.div_ceil(self.chunk_size as u64) as usize
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.chunk_count()
    }

    /// Step to the next chunk; false when already on the last one
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.index += 1;
        true
    }
}

/// Start a fresh push with the first chunk of the session's package.
///
/// Must only be called once every pending read has resolved and no write is
/// outstanding. If the chunk cannot be read the session is failed and no
/// write is prepared.
pub fn start_push(
    session: &mut UpdateSession,
    source: &dyn ChunkSource,
    settings: &DeliverySettings,
) -> Result<PreparedWrite, OtaError> {
    assert!(
        session.pending().is_empty(),
        "push started with {} observations pending",
        session.pending().len()
    );
    assert!(
        !session.is_write_in_flight(),
        "push started while a write is in flight"
    );

    let package = session
        .current()
        .ok_or_else(|| OtaError::NoPackage(session.kind().to_string()))?;
    let cursor = ChunkCursor::new(package, settings.chunk_size);

    let stored = match source.size(cursor.package_key()) {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Cannot read package {}: {}", cursor.package_key(), e);
            session.fail(e.to_string());
            return Err(e.into());
        }
    };
    if stored != cursor.package_size() {
        let err = OtaError::PackageSizeMismatch {
            package_id: cursor.package_key().to_string(),
            declared: cursor.package_size(),
            stored,
        };
        warn!("Refusing push: {}", err);
        session.fail(err.to_string());
        return Err(err);
    }

    let payload = match fetch(source, &cursor) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Cannot read first chunk of package {}: {}", cursor.package_key(), e);
            session.fail(e.to_string());
            return Err(e.into());
        }
    };

    info!(
        "Starting {} push of package {} ({} chunks)",
        session.kind(),
        cursor.package_key(),
        cursor.chunk_count()
    );

    let request = build_request(session, &cursor, payload, settings);
    let attempt = session.begin_push(cursor);
    Ok(PreparedWrite { attempt, request })
}

/// Prepare the write following an acknowledged chunk.
///
/// Returns `None` once the last chunk has been acknowledged.
pub fn continue_push(
    session: &mut UpdateSession,
    source: &dyn ChunkSource,
    settings: &DeliverySettings,
) -> Result<Option<PreparedWrite>, OtaError> {
    session.write_answered();
    if !session.advance_cursor() {
        return Ok(None);
    }

    let Some(cursor) = session.cursor().cloned() else {
        return Ok(None);
    };

    let payload = match fetch(source, &cursor) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                "Cannot read chunk {} of package {}: {}",
                cursor.index(),
                cursor.package_key(),
                e
            );
            session.fail(e.to_string());
            return Err(e.into());
        }
    };

    debug!(
        "Prepared chunk {}/{} of package {}",
        cursor.index() + 1,
        cursor.chunk_count(),
        cursor.package_key()
    );

    let request = build_request(session, &cursor, payload, settings);
    session.mark_write_in_flight();
    Ok(Some(PreparedWrite {
        attempt: session.attempt(),
        request,
    }))
}

fn fetch(source: &dyn ChunkSource, cursor: &ChunkCursor) -> Result<Vec<u8>, ChunkError> {
    source.get(cursor.package_key(), cursor.chunk_size(), cursor.index())
}

fn build_request(
    session: &UpdateSession,
    cursor: &ChunkCursor,
    payload: Vec<u8>,
    settings: &DeliverySettings,
) -> WriteRequest {
    WriteRequest {
        path: session.kind().package_path(),
        content_format: ContentFormat::Opaque,
        payload,
        timeout: settings.write_timeout,
        chunk_index: cursor.index(),
    }
}
