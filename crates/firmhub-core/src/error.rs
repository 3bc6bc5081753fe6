//! Application errors
//!
//! Services and repositories return [`AppError`]. How a variant is shown to clients
//! (status, code, wording, log level) is described through [`ErrorMetadata`] and
//! rendered as a problem-details body by the HTTP layer.
//!
//! The `Database` variant wraps `sqlx::Error` only when the `sqlx` feature is on.

use std::io;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected client mistakes.
    Debug,
    /// Refused state changes and other noteworthy rejections.
    Warn,
    /// Failures the operator has to look at.
    Error,
}

/// How an error presents itself outside the process.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable machine-readable code, e.g. `VALIDATION_FAILED`.
    fn error_code(&self) -> &'static str;

    /// True when retrying the same request may succeed.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show to the caller.
    fn client_message(&self) -> String;

    /// True when the internal message must not leave the server.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

/// A single field-level validation message, e.g. `answers[2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Token store error: {0}")]
    Cache(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stripe error: {0}")]
    StripeError(String),
}

impl AppError {
    /// Build a validation error carrying field-level messages.
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    /// Shortcut for a validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: message.clone(),
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Field-level errors attached to this error, if any.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation {
            message: "Request validation failed".to_string(),
            errors,
        }
    }
}

struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

const RETRY_SHORTLY: Option<&str> = Some("Retry after a short delay");

impl Presentation {
    /// A caller mistake: never retried, never hidden, logged at debug.
    const fn client(status: u16, code: &'static str, action: &'static str) -> Self {
        Self {
            status,
            code,
            recoverable: false,
            action: Some(action),
            sensitive: false,
            level: LogLevel::Debug,
        }
    }

    /// A server-side failure: details hidden, logged at error.
    const fn server(status: u16, code: &'static str) -> Self {
        Self {
            status,
            code,
            recoverable: true,
            action: RETRY_SHORTLY,
            sensitive: true,
            level: LogLevel::Error,
        }
    }
}

fn presentation(err: &AppError) -> Presentation {
    match err {
        AppError::Database(_) => Presentation::server(500, "DATABASE_ERROR"),
        AppError::Storage(_) => Presentation::server(500, "STORAGE_ERROR"),
        AppError::Cache(_) => Presentation::server(503, "CACHE_UNAVAILABLE"),
        AppError::ServiceUnavailable(_) => Presentation::server(503, "SERVICE_UNAVAILABLE"),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            Presentation::server(500, "INTERNAL_ERROR")
        }
        AppError::StripeError(_) => Presentation::server(502, "PAYMENT_PROVIDER_ERROR"),
        AppError::InvalidInput(_) => Presentation::client(
            400,
            "INVALID_INPUT",
            "Check request parameters and try again",
        ),
        AppError::Validation { .. } => Presentation::client(
            400,
            "VALIDATION_FAILED",
            "Fix the listed fields and try again",
        ),
        AppError::BadRequest(_) => {
            Presentation::client(400, "BAD_REQUEST", "Check request format and parameters")
        }
        AppError::NotFound(_) => {
            Presentation::client(404, "NOT_FOUND", "Verify the resource ID exists")
        }
        AppError::PayloadTooLarge(_) => {
            Presentation::client(413, "PAYLOAD_TOO_LARGE", "Upload a smaller file")
        }
        AppError::Unauthorized(_) => {
            Presentation::client(401, "UNAUTHORIZED", "Sign in again to get a fresh token")
        }
        AppError::Forbidden(_) => Presentation::client(
            403,
            "FORBIDDEN",
            "Use an account with access to this resource",
        ),
        AppError::Conflict(_) => {
            Presentation::client(409, "CONFLICT", "Reload the resource and retry")
        }
        AppError::InvalidStateTransition { .. } => Presentation {
            level: LogLevel::Warn,
            ..Presentation::client(409, "INVALID_STATE", "Check the current status of the resource")
        },
    }
}

impl AppError {
    /// Variant name, used as a structured log field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Cache(_) => "Cache",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Validation { .. } => "Validation",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidStateTransition { .. } => "InvalidStateTransition",
            AppError::ServiceUnavailable(_) => "ServiceUnavailable",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
            AppError::StripeError(_) => "StripeError",
        }
    }

    /// The error followed by up to five levels of `source()`, one per line.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(cause) = source {
            if depth == 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str("\n  Caused by: ");
            details.push_str(&cause.to_string());
            source = cause.source();
            depth += 1;
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        presentation(self).status
    }

    fn error_code(&self) -> &'static str {
        presentation(self).code
    }

    fn is_recoverable(&self) -> bool {
        presentation(self).recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        presentation(self).action
    }

    fn is_sensitive(&self) -> bool {
        presentation(self).sensitive
    }

    fn log_level(&self) -> LogLevel {
        presentation(self).level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Cache(_) | AppError::ServiceUnavailable(_) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::StripeError(_) => "Payment processing error".to_string(),
            AppError::InvalidStateTransition { from, to } => {
                format!("Cannot move from {} to {}", from, to)
            }
            AppError::Validation { message, .. } => message.clone(),
            AppError::InvalidInput(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Firm not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Firm not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_invalid_state_transition_is_conflict() {
        let err = AppError::InvalidStateTransition {
            from: "draft".to_string(),
            to: "approved".to_string(),
        };
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(err.client_message().contains("draft"));
        assert!(err.client_message().contains("approved"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_validation_carries_field_errors() {
        let err = AppError::field("answers[0]", "Question not found");
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "answers[0]");

        let other = AppError::NotFound("x".to_string());
        assert!(other.field_errors().is_empty());
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::Internal("connection string leaked".to_string());
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("outer"));
    }
}
