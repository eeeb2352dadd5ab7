//! Provider-agnostic upload handler
//!
//! `CloudStorageHandler` turns local output files into public URLs: it names the object,
//! picks a Content-Type, uploads through the configured [`Storage`] backend and confirms the
//! object is visible before reporting success.

use crate::content_type::guess_content_type;
use crate::factory::create_storage;
use crate::keys::{build_object_key, KeyOptions};
use crate::traits::{Storage, StorageError, StorageResult};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vhs_core::{StorageConfig, VerifyPolicy};

/// A file that was uploaded and verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedObject {
    pub local_path: PathBuf,
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Outcome of one file in a batch upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub path: PathBuf,
    pub outcome: Result<UploadedObject, String>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn url(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(|o| o.url.as_str())
    }
}

impl Serialize for UploadResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Record<'a> {
            path: &'a Path,
            success: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            key: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            url: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
        }

        let record = match &self.outcome {
            Ok(object) => Record {
                path: &self.path,
                success: true,
                key: Some(object.key.as_str()),
                url: Some(object.url.as_str()),
                error: None,
            },
            Err(error) => Record {
                path: &self.path,
                success: false,
                key: None,
                url: None,
                error: Some(error.as_str()),
            },
        };
        record.serialize(serializer)
    }
}

/// URLs of the successful uploads, in input order
pub fn successful_urls(results: &[UploadResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| r.url().map(str::to_string))
        .collect()
}

#[derive(Clone)]
pub struct CloudStorageHandler {
    storage: Arc<dyn Storage>,
    verify: VerifyPolicy,
    max_concurrent_uploads: usize,
}

impl CloudStorageHandler {
    pub fn new(storage: Arc<dyn Storage>, verify: VerifyPolicy, max_concurrent_uploads: usize) -> Self {
        CloudStorageHandler {
            storage,
            verify,
            max_concurrent_uploads: max_concurrent_uploads.max(1),
        }
    }

    /// Build the backend named by `config` and wrap it
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        tracing::info!(
            provider = %config.provider,
            bucket = %config.bucket,
            test_mode = config.test_mode,
            "Initializing cloud storage handler"
        );
        let storage = create_storage(config).await?;
        Ok(Self::new(storage, config.verify, config.max_concurrent_uploads))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Upload one file and wait until the object is visible.
    #[tracing::instrument(skip(self, path, opts), fields(path = %path.display()))]
    pub async fn upload_file(&self, path: &Path, opts: &KeyOptions) -> StorageResult<UploadedObject> {
        let size_bytes = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(StorageError::FileNotFound(path.to_path_buf())),
        };

        let key = build_object_key(path, opts)?;
        let content_type = guess_content_type(path);

        tracing::info!(
            location = %self.storage.location(&key),
            content_type,
            size_bytes,
            "Uploading file"
        );

        let url = self.storage.upload_file(&key, path, content_type).await?;

        if !self.verify_upload(&key).await {
            return Err(StorageError::VerificationFailed {
                key,
                attempts: self.verify.max_attempts.max(1),
            });
        }

        Ok(UploadedObject {
            local_path: path.to_path_buf(),
            key,
            url,
            content_type: content_type.to_string(),
            size_bytes,
        })
    }

    /// Check that `key` exists, retrying with the configured delay.
    ///
    /// Backend errors count as a failed attempt. No delay follows the last attempt.
    pub async fn verify_upload(&self, key: &str) -> bool {
        let attempts = self.verify.max_attempts.max(1);
        let location = self.storage.location(key);

        for attempt in 1..=attempts {
            match self.storage.exists(key).await {
                Ok(true) => {
                    tracing::debug!(location = %location, attempt, "Upload verified");
                    return true;
                }
                Ok(false) => {
                    tracing::debug!(
                        location = %location,
                        attempt,
                        max_attempts = attempts,
                        "Waiting for object to become available"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        location = %location,
                        attempt,
                        error = %e,
                        "Verification check failed"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.verify.delay).await;
            }
        }

        tracing::warn!(location = %location, attempts, "Could not verify upload");
        false
    }

    /// Upload several files under `prefix`.
    ///
    /// Returns one result per input path, in input order. A failed file never stops the batch.
    pub async fn upload_files(&self, paths: &[PathBuf], prefix: Option<&str>) -> Vec<UploadResult> {
        let opts = KeyOptions {
            prefix: prefix.map(str::to_string),
            ..Default::default()
        };
        let opts = &opts;

        let results: Vec<UploadResult> = stream::iter(paths.iter().cloned())
            .map(move |path| async move {
                let outcome = self.upload_file(&path, opts).await.map_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "Upload failed");
                    e.to_string()
                });
                UploadResult { path, outcome }
            })
            .buffered(self.max_concurrent_uploads)
            .collect()
            .await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Batch upload finished"
        );

        results
    }

    /// Download an object to `dest`, creating parent directories as needed
    pub async fn download_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        tracing::info!(
            location = %self.storage.location(key),
            dest = %dest.display(),
            "Downloading object"
        );

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.storage.download_to(key, dest).await
    }

    pub fn public_url(&self, key: &str) -> String {
        self.storage.public_url(key)
    }
}
