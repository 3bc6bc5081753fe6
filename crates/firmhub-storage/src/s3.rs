use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload};
use std::time::Duration;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// `endpoint_url` targets S3-compatible providers such as MinIO
    /// (e.g. "http://localhost:9000"). Credentials come from the environment.
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len() as u64;
        let location = Path::from(key);
        let start = std::time::Instant::now();

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        let start = std::time::Instant::now();
        let location = Path::from(key);

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let location = Path::from(key);

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 delete failed");
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(bucket = %self.bucket, key = %key, "S3 delete successful");

        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        validate_key(from_key)?;
        validate_key(to_key)?;
        let from = Path::from(from_key);
        let to = Path::from(to_key);

        self.store.copy(&from, &to).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(from_key.to_string()),
            other => StorageError::BackendError(other.to_string()),
        })?;

        tracing::info!(from_key = %from_key, to_key = %to_key, "S3 copy successful");

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let location = Path::from(key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        validate_key(key)?;
        let location = Path::from(key);
        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(url.to_string())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
