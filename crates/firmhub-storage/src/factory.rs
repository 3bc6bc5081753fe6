#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use firmhub_core::Config;
use std::sync::Arc;

#[allow(dead_code)]
fn required(value: Option<&str>, key: &str) -> StorageResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| StorageError::ConfigError(format!("{} is required for this backend", key)))
}

#[allow(dead_code)]
fn not_compiled(backend: StorageBackend) -> StorageError {
    StorageError::ConfigError(format!(
        "STORAGE_BACKEND={} but firmhub-storage was built without the storage-{} feature",
        backend, backend
    ))
}

/// Build the media store selected by `STORAGE_BACKEND`.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend();
    tracing::info!(backend = %backend, "Initializing media storage");

    let storage: Arc<dyn Storage> = match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => Arc::new(S3Storage::new(
            required(config.s3_bucket(), "S3_BUCKET")?,
            required(config.s3_region(), "S3_REGION")?,
            config.s3_endpoint().map(str::to_owned),
        )?),
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => Arc::new(
            LocalStorage::new(
                required(config.local_storage_path(), "LOCAL_STORAGE_PATH")?,
                required(config.local_storage_base_url(), "LOCAL_STORAGE_BASE_URL")?,
            )
            .await?,
        ),
        #[allow(unreachable_patterns)]
        other => return Err(not_compiled(other)),
    };
    Ok(storage)
}
