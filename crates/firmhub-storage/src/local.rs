use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, serving files under `base_url`.
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(key = %key, size_bytes = data.len(), "Local storage upload successful");

        Ok(())
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(key = %key, "Local storage delete successful");

        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::info!(from_key = %from_key, to_key = %to_key, "Local storage copy successful");

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Local files are served as-is; the URL does not expire.
    async fn presigned_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{final_key, temp_key};
    use tempfile::tempdir;
    use uuid::Uuid;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:8080/files".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = temp_key(Uuid::new_v4(), Uuid::new_v4(), "txt");

        storage
            .put(&key, b"hello".to_vec(), "text/plain")
            .await
            .unwrap();

        assert_eq!(storage.download(&key).await.unwrap(), b"hello");
        assert!(storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_from_quarantine() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let (firm, media) = (Uuid::new_v4(), Uuid::new_v4());
        let temp = temp_key(firm, media, "pdf");
        let published = final_key(firm, media, "pdf");

        storage
            .put(&temp, b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();
        storage.copy(&temp, &published).await.unwrap();
        storage.delete(&temp).await.unwrap();

        assert!(!storage.exists(&temp).await.unwrap());
        assert_eq!(storage.download(&published).await.unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_missing_objects() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("media/none.txt").await.is_ok());
        assert!(matches!(
            storage.download("media/none.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.copy("temp/none.txt", "media/none.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(matches!(
            storage.download("../../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.exists("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_presigned_url_uses_base_url() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let url = storage
            .presigned_url("media/a/b.png", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/files/media/a/b.png");
    }
}
