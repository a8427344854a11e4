//! File access for settings and package binaries

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;

use crate::errors::OtaError;

#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn read_string(&self) -> Result<String, OtaError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read a whole package binary into memory
    pub async fn read_bytes(&self) -> Result<Vec<u8>, OtaError> {
        Ok(fs::read(&self.path).await?)
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, OtaError> {
        let contents = self.read_string().await?;
        serde_json::from_str(&contents).map_err(|e| {
            OtaError::ConfigError(format!("{}: {}", self.path.display(), e))
        })
    }
}
