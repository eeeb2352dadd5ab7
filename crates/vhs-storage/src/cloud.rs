use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::CloudProvider;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, Attributes, DynObjectStore, ObjectStoreExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use vhs_core::{ProviderCredentials, StorageConfig};

/// Object storage implementation for S3, Google Cloud Storage and Azure Blob Storage
#[derive(Clone)]
pub struct CloudStorage {
    store: Arc<DynObjectStore>,
    provider: CloudProvider,
    bucket: String,
    url_base: String,
    container_hint_logged: Arc<AtomicBool>,
}

impl CloudStorage {
    /// Build the backend described by `config`.
    ///
    /// Only the `aws`, `google` and `azure` providers are object stores; `local` is rejected.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let bucket = config.bucket.clone();

        match &config.credentials {
            ProviderCredentials::Aws {
                access_key_id,
                secret_access_key,
                region,
                endpoint,
            } => {
                let mut builder = AmazonS3Builder::new()
                    .with_access_key_id(access_key_id.expose())
                    .with_secret_access_key(secret_access_key.expose())
                    .with_region(region.clone())
                    .with_bucket_name(bucket.clone());

                if let Some(ref endpoint) = endpoint {
                    let allow_http = endpoint.starts_with("http://");
                    builder = builder
                        .with_endpoint(endpoint.clone())
                        .with_allow_http(allow_http);
                }

                let store = builder
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))?;

                let url_base = match endpoint {
                    // Path-style for S3-compatible providers: {endpoint}/{bucket}
                    Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
                    None => format!("https://{}.s3.amazonaws.com", bucket),
                };

                tracing::debug!(bucket = %bucket, region = %region, "Initialized AWS S3 storage");
                Ok(Self::with_store(Arc::new(store), CloudProvider::Aws, bucket, url_base))
            }

            ProviderCredentials::Google {
                service_account_path,
            } => {
                let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket.clone());
                if let Some(path) = service_account_path {
                    tracing::debug!(path = %path.display(), "Using Google service account file");
                    builder = builder.with_service_account_path(path.to_string_lossy());
                }

                let store = builder
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))?;

                let url_base = format!("https://storage.googleapis.com/{}", bucket);

                tracing::debug!(bucket = %bucket, "Initialized Google Cloud Storage");
                Ok(Self::with_store(Arc::new(store), CloudProvider::Google, bucket, url_base))
            }

            ProviderCredentials::Azure {
                account,
                access_key,
            } => {
                let store = MicrosoftAzureBuilder::new()
                    .with_account(account.clone())
                    .with_access_key(access_key.expose())
                    .with_container_name(bucket.clone())
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))?;

                let url_base = format!("https://{}.blob.core.windows.net/{}", account, bucket);

                tracing::debug!(container = %bucket, "Initialized Azure Blob Storage");
                Ok(Self::with_store(Arc::new(store), CloudProvider::Azure, bucket, url_base))
            }

            ProviderCredentials::Local { .. } => Err(StorageError::ConfigError(
                "Local provider is not an object store; use LocalStorage".to_string(),
            )),
        }
    }

    /// Wrap an existing object store.
    ///
    /// Public URLs are formed as `{url_base}/{key}`.
    pub fn with_store(
        store: Arc<DynObjectStore>,
        provider: CloudProvider,
        bucket: impl Into<String>,
        url_base: impl Into<String>,
    ) -> Self {
        CloudStorage {
            store,
            provider,
            bucket: bucket.into(),
            url_base: url_base.into().trim_end_matches('/').to_string(),
            container_hint_logged: Arc::new(AtomicBool::new(false)),
        }
    }

    fn object_path(storage_key: &str) -> StorageResult<ObjectPath> {
        validate_key(storage_key)?;
        ObjectPath::parse(storage_key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    /// Stream `reader` into the object at `storage_key`, tagging it with `content_type`
    async fn write_object<R>(
        &self,
        storage_key: &str,
        reader: &mut R,
        content_type: &str,
    ) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let location = Self::object_path(storage_key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let mut writer =
            BufWriter::new(Arc::clone(&self.store), location).with_attributes(attributes);

        let copied = match tokio::io::copy(reader, &mut writer).await {
            Ok(copied) => copied,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(error = %abort_err, key = %storage_key, "Failed to abort upload");
                }
                return Err(self.upload_failed(e));
            }
        };

        writer.shutdown().await.map_err(|e| self.upload_failed(e))?;

        Ok(copied)
    }

    /// Upload error for this backend. Azure containers are never created here, so Azure
    /// failures carry a hint and the first one is logged as a warning.
    fn upload_failed(&self, error: impl std::fmt::Display) -> StorageError {
        if self.provider != CloudProvider::Azure {
            return StorageError::UploadFailed(error.to_string());
        }

        if !self.container_hint_logged.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                container = %self.bucket,
                "Azure upload failed; the container must already exist in the storage account"
            );
        }
        StorageError::UploadFailed(format!(
            "{} (Azure container '{}' must already exist)",
            error, self.bucket
        ))
    }
}

/// Copy an object stream into `writer`. Stream and write errors are both returned.
async fn stream_into<S, T, W>(mut stream: S, writer: &mut W) -> StorageResult<u64>
where
    S: Stream<Item = Result<T, ObjectStoreError>> + Unpin,
    T: AsRef<[u8]>,
    W: AsyncWrite + Unpin,
{
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        let chunk = chunk.as_ref();
        writer.write_all(chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

#[async_trait]
impl Storage for CloudStorage {
    async fn upload_file(
        &self,
        storage_key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<String> {
        let start = std::time::Instant::now();

        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(path.to_path_buf())
            } else {
                StorageError::IoError(e)
            }
        })?;

        let size = self
            .write_object(storage_key, &mut file, content_type)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    provider = %self.provider,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Cloud upload failed"
                );
            })?;

        tracing::info!(
            provider = %self.provider,
            bucket = %self.bucket,
            key = %storage_key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud upload successful"
        );

        Ok(self.public_url(storage_key))
    }

    async fn upload_bytes(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let start = std::time::Instant::now();
        let size = data.len() as u64;
        let mut reader = std::io::Cursor::new(data);

        self.write_object(storage_key, &mut reader, content_type)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    provider = %self.provider,
                    bucket = %self.bucket,
                    key = %storage_key,
                    size_bytes = size,
                    "Cloud upload_bytes failed"
                );
            })?;

        tracing::info!(
            provider = %self.provider,
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud upload_bytes successful"
        );

        Ok(self.public_url(storage_key))
    }

    async fn download_to(&self, storage_key: &str, dest: &Path) -> StorageResult<u64> {
        let start = std::time::Instant::now();
        let location = Self::object_path(storage_key)?;

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let mut file = tokio::fs::File::create(dest).await?;
        let copied = async {
            let written = stream_into(result.into_stream(), &mut file).await?;
            file.sync_all().await?;
            Ok::<u64, StorageError>(written)
        }
        .await;

        let written = match copied {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                    tracing::debug!(
                        dest = %dest.display(),
                        error = %remove_err,
                        "No partial download to remove"
                    );
                }
                tracing::error!(
                    error = %e,
                    provider = %self.provider,
                    key = %storage_key,
                    "Cloud stream download error"
                );
                return Err(e);
            }
        };

        tracing::info!(
            provider = %self.provider,
            bucket = %self.bucket,
            key = %storage_key,
            dest = %dest.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud download successful"
        );

        Ok(written)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let location = Self::object_path(storage_key)?;

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Self::object_path(storage_key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let location = Self::object_path(storage_key)?;

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(
                    provider = %self.provider,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "Cloud delete successful"
                );
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.url_base, storage_key)
    }

    fn location(&self, storage_key: &str) -> String {
        format!("{}://{}/{}", self.provider, self.bucket, storage_key)
    }

    fn provider(&self) -> CloudProvider {
        self.provider
    }
}
