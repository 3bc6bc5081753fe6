//! Multipart upload helpers for media handlers.

use crate::constants::MAX_FILENAME_LENGTH;
use axum::extract::Multipart;
use firmhub_core::AppError;

/// The single `file` part of an upload form.
#[derive(Debug)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Read the form's one field named `file`, refusing to buffer more than `max_size` bytes.
pub async fn extract_multipart_file(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<UploadedFile, AppError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::InvalidInput(
                "Send exactly one field named 'file'".to_string(),
            ));
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
        {
            validate_file_size(data.len() + chunk.len(), max_size)?;
            data.extend_from_slice(&chunk);
        }

        upload = Some(UploadedFile {
            data,
            filename,
            content_type,
        });
    }

    let upload = upload.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    if upload.data.is_empty() {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    Ok(upload)
}

pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Lowercased MIME type without parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Check against the allowlist and return the normalized type.
pub fn validate_content_type(content_type: &str, allowed: &[String]) -> Result<String, AppError> {
    let normalized = normalize_content_type(content_type);
    if !allowed.iter().any(|ct| ct.eq_ignore_ascii_case(&normalized)) {
        return Err(AppError::InvalidInput(format!(
            "Invalid content type. Allowed types: {}",
            allowed.join(", ")
        )));
    }
    Ok(normalized)
}

/// Check the extension against the allowlist and return it lowercased.
pub fn validate_file_extension(filename: &str, allowed: &[String]) -> Result<String, AppError> {
    let extension = firmhub_storage::keys::extension_of(filename).unwrap_or_default();
    if extension.is_empty() || !allowed.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
        return Err(AppError::InvalidInput(format!(
            "Invalid file extension. Allowed extensions: {}",
            allowed.join(", ")
        )));
    }
    Ok(extension)
}

/// Strip directories and unusual characters from a client filename.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if base.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = base
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(['_', '.']).is_empty() {
        return Ok("file".to_string());
    }
    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_size_limit() {
        assert!(validate_file_size(10, 10).is_ok());
        assert!(matches!(
            validate_file_size(11, 10),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_content_type_parameters_do_not_bypass_allowlist() {
        let allowed = list(&["application/pdf", "image/png"]);
        assert_eq!(
            validate_content_type("Image/PNG; charset=binary", &allowed).unwrap(),
            "image/png"
        );
        assert!(validate_content_type("text/html; x=image/png", &allowed).is_err());
    }

    #[test]
    fn test_extension_allowlist() {
        let allowed = list(&["pdf", "png"]);
        assert_eq!(validate_file_extension("Brochure.PDF", &allowed).unwrap(), "pdf");
        assert!(validate_file_extension("run.exe", &allowed).is_err());
        assert!(validate_file_extension("noextension", &allowed).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("C:\\docs\\my file.pdf").unwrap(), "my_file.pdf");
        assert_eq!(sanitize_filename("/etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("???").unwrap(), "file");
        assert!(sanitize_filename("a..b").is_err());
    }
}
