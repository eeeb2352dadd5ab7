//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::CloudProvider;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Could not verify upload of {key} after {attempts} attempts")]
    VerificationFailed { key: String, attempts: u32 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<vhs_core::ConfigError> for StorageError {
    fn from(err: vhs_core::ConfigError) -> Self {
        StorageError::ConfigError(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, Google Cloud Storage, Azure Blob Storage, local filesystem)
/// implement this trait so the upload handler works with any of them.
///
/// **Key format:** keys are relative object paths such as `runs/42/vhs_00001.mp4`.
/// They never start with `/` and never contain `..` segments.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a local file to `storage_key` and return its public URL.
    ///
    /// The file is streamed; it is never read fully into memory.
    async fn upload_file(
        &self,
        storage_key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Upload in-memory data to `storage_key` and return its public URL.
    async fn upload_bytes(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Download an object into a local file, replacing it if present
    async fn download_to(&self, storage_key: &str, dest: &Path) -> StorageResult<u64>;

    /// Download an object into memory
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Public URL of an object
    fn public_url(&self, storage_key: &str) -> String;

    /// Human-readable location, e.g. `aws://bucket/key`
    fn location(&self, storage_key: &str) -> String;

    fn provider(&self) -> CloudProvider;
}
