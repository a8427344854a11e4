//! Package binary cache

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::errors::{ChunkError, OtaError};
use crate::filesys::file::File;
use crate::ota::delivery::ChunkSource;
use crate::utils::{checksum_matches, sha256_hash};

/// Package cache entry
#[derive(Debug, Clone)]
pub struct PackageCacheEntry {
    pub data: Arc<Vec<u8>>,
    pub checksum: String,
    pub cached_at: u64,
}

/// In-memory package cache shared by every session
pub struct PackageCache {
    entries: RwLock<HashMap<String, PackageCacheEntry>>,
    capacity: u64,
}

impl PackageCache {
    /// Create a new package cache
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Get a package from cache
    pub fn get_entry(&self, package_id: &str) -> Option<PackageCacheEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(package_id).cloned()
    }

    pub fn contains(&self, package_id: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(package_id)
    }

    /// Insert a package into cache
    pub fn insert(&self, package_id: impl Into<String>, data: Vec<u8>) -> PackageCacheEntry {
        let package_id = package_id.into();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict oldest if at capacity
        if !entries.contains_key(&package_id) && entries.len() as u64 >= self.capacity {
            if let Some(oldest_id) = entries
                .iter()
                .min_by_key(|(_, e)| e.cached_at)
                .map(|(id, _)| id.clone())
            {
                debug!("Evicting package {} from cache", oldest_id);
                entries.remove(&oldest_id);
            }
        }

        let entry = PackageCacheEntry {
            checksum: sha256_hash(&data),
            data: Arc::new(data),
            cached_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };

        entries.insert(package_id, entry.clone());
        entry
    }

    /// Load a package binary from disk, verifying its checksum if given
    pub async fn load_file(
        &self,
        package_id: &str,
        path: &Path,
        checksum: Option<&str>,
    ) -> Result<PackageCacheEntry, OtaError> {
        let data = File::new(path).read_bytes().await?;

        if let Some(expected) = checksum {
            let actual = sha256_hash(&data);
            if !checksum_matches(expected, &actual) {
                return Err(OtaError::ChecksumMismatch {
                    package_id: package_id.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        info!(
            "Cached package {} ({} bytes) from {}",
            package_id,
            data.len(),
            path.display()
        );
        Ok(self.insert(package_id, data))
    }

    /// Remove a package from cache
    pub fn remove(&self, package_id: &str) -> Option<PackageCacheEntry> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(package_id)
    }

    /// Get all cached package IDs
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    /// Get cache size
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkSource for PackageCache {
    fn get(
        &self,
        package_id: &str,
        chunk_size: usize,
        chunk_index: usize,
    ) -> Result<Vec<u8>, ChunkError> {
        // Clone the Arc so the lock is not held while copying bytes
        let data = self
            .get_entry(package_id)
            .map(|entry| entry.data)
            .ok_or_else(|| ChunkError::NotFound(package_id.to_string()))?;

        let truncated = || ChunkError::Truncated {
            package_id: package_id.to_string(),
            chunk_size,
            chunk_index,
            available: data.len(),
        };

        if chunk_size == 0 {
            return if chunk_index == 0 {
                Ok(data.to_vec())
            } else {
                Err(truncated())
            };
        }

        let start = chunk_size.checked_mul(chunk_index).ok_or_else(truncated)?;
        if start > data.len() || (start == data.len() && chunk_index > 0) {
            return Err(truncated());
        }
        let end = start.saturating_add(chunk_size).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn size(&self, package_id: &str) -> Result<u64, ChunkError> {
        self.get_entry(package_id)
            .map(|entry| entry.data.len() as u64)
            .ok_or_else(|| ChunkError::NotFound(package_id.to_string()))
    }
}
