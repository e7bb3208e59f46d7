use crate::{ObjectStoreStorage, Storage, StorageBackend, StorageError, StorageResult};
use placedoc_core::Config;
use std::sync::Arc;

/// Create the storage for all three areas based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage_config = &config.storage;

    match storage_config.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let storage = ObjectStoreStorage::s3(storage_config)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = storage_config
                .local_storage_path
                .clone()
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
                })?;

            let storage = ObjectStoreStorage::local(base_path, storage_config).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; files are lost when the process exits");
            Ok(Arc::new(ObjectStoreStorage::in_memory()))
        }
    }
}
