//! Error types for the update orchestrator

use thiserror::Error;

/// Failure reported by a chunk source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("package not found: {0}")]
    NotFound(String),

    #[error("package {package_id} has no chunk {chunk_index} (chunk size {chunk_size}, {available} bytes available)")]
    Truncated {
        package_id: String,
        chunk_size: usize,
        chunk_index: usize,
        available: usize,
    },
}

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OtaError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Stale observation: {0} is not pending")]
    StaleObservation(String),

    #[error("Chunk unavailable: {0}")]
    ChunkUnavailable(#[from] ChunkError),

    #[error("Dispatch failure: {0}")]
    DispatchFailure(String),

    #[error("Dispatch timed out after {0:?}")]
    DispatchTimeout(std::time::Duration),

    #[error("Unrecognized {kind} status code pair (state {state}, result {result})")]
    UnrecognizedStatusCode {
        kind: String,
        state: i64,
        result: i64,
    },

    #[error("No package scheduled: {0}")]
    NoPackage(String),

    #[error("Checksum mismatch for package {package_id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package_id: String,
        expected: String,
        actual: String,
    },

    #[error("Package {package_id} is {stored} bytes but was scheduled as {declared}")]
    PackageSizeMismatch {
        package_id: String,
        declared: u64,
        stored: u64,
    },

    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
