//! Shared key generation for storage backends.

use firmhub_core::constants::{MEDIA_PREFIX, TEMP_MEDIA_PREFIX};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Quarantine key for a file waiting for its scan.
pub fn temp_key(firm_id: Uuid, media_id: Uuid, extension: &str) -> String {
    format!("{}/{}/{}.{}", TEMP_MEDIA_PREFIX, firm_id, media_id, extension)
}

/// Permanent key for a file that passed the scan.
pub fn final_key(firm_id: Uuid, media_id: Uuid, extension: &str) -> String {
    format!("{}/{}/{}.{}", MEDIA_PREFIX, firm_id, media_id, extension)
}

/// Lowercased extension of an uploaded filename, if it has a usable one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 10 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_and_final_keys_share_the_file_name() {
        let firm = Uuid::new_v4();
        let media = Uuid::new_v4();
        let temp = temp_key(firm, media, "pdf");
        let published = final_key(firm, media, "pdf");
        assert_eq!(temp, format!("temp/{}/{}.pdf", firm, media));
        assert_eq!(published, format!("media/{}/{}.pdf", firm, media));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Brochure.PDF"), Some("pdf".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".env"), None);
        assert_eq!(extension_of("weird.p$f"), None);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("media/a/b.png").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
