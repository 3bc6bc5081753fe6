//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use std::time::Duration;
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

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for firmhub_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                firmhub_core::AppError::NotFound(format!("Stored file {}", key))
            }
            other => firmhub_core::AppError::Storage(other.to_string()),
        }
    }
}

/// Object storage used by the media pipeline.
///
/// Keys are produced by [`crate::keys`]; backends never invent their own layout.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Read a whole object.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Copy an object to a new key.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time-limited download URL.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    fn backend_type(&self) -> StorageBackend;
}
