//! Where firm media objects are kept.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend named by `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible object store (AWS, MinIO, R2).
    #[default]
    S3,
    /// A directory on the API host, used in development and tests.
    Local,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Local => "local",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [StorageBackend::S3, StorageBackend::Local]
            .into_iter()
            .find(|backend| backend.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!("STORAGE_BACKEND must be 's3' or 'local', got '{}'", value)
            })
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" Local ".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }
}
