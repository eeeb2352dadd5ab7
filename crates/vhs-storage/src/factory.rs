#[cfg(feature = "storage-cloud")]
use crate::CloudStorage;
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{CloudProvider, Storage, StorageError, StorageResult};
use std::sync::Arc;
use vhs_core::{ProviderCredentials, StorageConfig};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.provider {
        #[cfg(feature = "storage-cloud")]
        CloudProvider::Aws | CloudProvider::Google | CloudProvider::Azure => {
            let storage = CloudStorage::from_config(config)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-cloud"))]
        CloudProvider::Aws | CloudProvider::Google | CloudProvider::Azure => {
            Err(StorageError::ConfigError(format!(
                "{} storage backend not available (storage-cloud feature not enabled)",
                config.provider
            )))
        }

        #[cfg(feature = "storage-local")]
        CloudProvider::Local => match &config.credentials {
            ProviderCredentials::Local { root, base_url } => {
                let storage = LocalStorage::new(root.clone(), base_url.clone()).await?;
                Ok(Arc::new(storage))
            }
            _ => Err(StorageError::ConfigError(
                "Local provider requires LOCAL_STORAGE_PATH".to_string(),
            )),
        },

        #[cfg(not(feature = "storage-local"))]
        CloudProvider::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
