//! Package descriptors

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Package the server intends to push to a device
///
/// Immutable for the lifetime of one push attempt. Scheduling a new update
/// replaces the descriptor rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Key into the chunk source
    pub id: Uuid,

    /// Compared against the device-reported package name
    #[serde(default)]
    pub title: Option<String>,

    /// Compared against the device-reported package version
    #[serde(default)]
    pub version: Option<String>,

    /// Binary size in bytes
    pub size: u64,

    /// Lowercase hex SHA-256 of the binary
    #[serde(default)]
    pub checksum: Option<String>,
}

impl PackageDescriptor {
    pub fn new(id: Uuid, size: u64) -> Self {
        Self {
            id,
            title: None,
            version: None,
            size,
            checksum: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Key used for chunk source lookups
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}
