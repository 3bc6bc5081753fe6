//! HTTP error response conversion
//!
//! Every error leaves the API as an `application/problem+json` body. A short chain of
//! special handlers looks at database failures first (constraint violations, lost
//! connections); everything else falls through to the status carried by
//! [`ErrorMetadata`].
//!
//! **Preferred handler pattern:** return `Result<impl IntoResponse, HttpAppError>` and let
//! `?` convert any `AppError`.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use firmhub_core::{AppError, ErrorMetadata, LogLevel};
use firmhub_infra::{current_request_id, ProblemDetails, PROBLEM_JSON};
use firmhub_storage::StorageError;
use serde::de::DeserializeOwned;

/// Wrapper type for AppError to implement IntoResponse.
/// Needed because of the orphan rule: `AppError` lives in firmhub-core.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(err.into())
    }
}

/// Convert JSON body deserialization failures into a 400 problem.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        let body_text = rejection.body_text();
        let message = if body_text.contains("expected a formatted UUID") {
            "Invalid request body: identifiers must be UUID strings".to_string()
        } else {
            format!("Invalid request body: {}", body_text)
        };
        HttpAppError(AppError::InvalidInput(message))
    }
}

/// JSON body extractor that rejects with a problem body instead of axum's plain text.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

/// A handler consulted before the generic mapping. Returns `None` to pass.
trait SpecialErrorHandler: Send + Sync {
    fn handle(&self, error: &AppError) -> Option<ProblemDetails>;
}

/// Integrity and serialization failures reported by Postgres.
struct DatabaseConstraintHandler;

/// Lost connections, exhausted pools and a server going away.
struct DatabaseAvailabilityHandler;

static SPECIAL_HANDLERS: &[&dyn SpecialErrorHandler] =
    &[&DatabaseConstraintHandler, &DatabaseAvailabilityHandler];

/// The sqlx error behind `error`, whether raised directly or wrapped with context.
fn sqlx_error(error: &AppError) -> Option<&sqlx::Error> {
    match error {
        AppError::Database(err) => Some(err),
        AppError::InternalWithSource { source, .. } => source.downcast_ref::<sqlx::Error>(),
        _ => None,
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

impl SpecialErrorHandler for DatabaseConstraintHandler {
    fn handle(&self, error: &AppError) -> Option<ProblemDetails> {
        let code = sqlstate(sqlx_error(error)?)?;
        let (status, error_code, detail) = match code.as_str() {
            "23505" => (409, "CONFLICT", "The resource already exists"),
            "23503" => (400, "INVALID_REFERENCE", "A referenced resource does not exist"),
            "23502" => (400, "MISSING_VALUE", "A required value is missing"),
            "23514" => (400, "CONSTRAINT_VIOLATION", "A value is outside the allowed range"),
            "22P02" => (400, "MALFORMED_VALUE", "A value has an invalid format"),
            "40001" | "40P01" => (
                409,
                "CONCURRENT_UPDATE",
                "The resource was modified concurrently, retry the request",
            ),
            _ => return None,
        };
        Some(ProblemDetails::new(status, error_code, title_for(status), detail))
    }
}

impl SpecialErrorHandler for DatabaseAvailabilityHandler {
    fn handle(&self, error: &AppError) -> Option<ProblemDetails> {
        let err = sqlx_error(error)?;
        let unavailable = match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
            sqlx::Error::Tls(_) => true,
            sqlx::Error::Database(_) => sqlstate(err).is_some_and(|code| {
                code.starts_with("08") || code.starts_with("53") || code == "57P01"
            }),
            _ => false,
        };
        unavailable.then(|| {
            ProblemDetails::new(
                503,
                "DATABASE_UNAVAILABLE",
                title_for(503),
                "Service temporarily unavailable",
            )
        })
    }
}

fn title_for(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error")
}

/// Problem body for `error`, without the trace id.
///
/// Only the client message ever reaches the body; sources and SQL stay in the logs.
pub fn problem_for(error: &AppError) -> ProblemDetails {
    if let Some(problem) = SPECIAL_HANDLERS.iter().find_map(|h| h.handle(error)) {
        return problem;
    }

    let status = error.http_status_code();
    ProblemDetails::new(
        status,
        error.error_code(),
        title_for(status),
        error.client_message(),
    )
    .with_errors(error.field_errors().to_vec())
}

fn log_error(error: &AppError, status: u16, trace_id: Option<&str>) {
    let error_type = error.error_type();
    let details = error.detailed_message();
    // Handlers may upgrade a quiet error to a 5xx (lost database connection)
    let level = if status >= 500 {
        LogLevel::Error
    } else {
        error.log_level()
    };
    match level {
        LogLevel::Debug => {
            tracing::debug!(error = %details, error_type, status, trace_id, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %details, error_type, status, trace_id, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %details, error_type, status, trace_id, "Error occurred");
        }
    }
}

/// Render a problem body with its status and `application/problem+json`.
pub fn problem_response(problem: ProblemDetails) -> Response {
    let status = StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(problem)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    response
}

/// 429 for callers that keep failing authentication.
pub fn too_many_auth_failures() -> Response {
    problem_response(
        ProblemDetails::new(
            429,
            "TOO_MANY_AUTH_FAILURES",
            title_for(429),
            "Too many failed authentication attempts",
        )
        .with_trace_id(current_request_id()),
    )
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let trace_id = current_request_id();
        let problem = problem_for(&self.0).with_trace_id(trace_id.clone());

        log_error(&self.0, problem.status, trace_id.as_deref());

        problem_response(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firmhub_core::FieldError;

    #[test]
    fn test_validation_error_carries_field_errors() {
        let err = AppError::validation(
            "One or more answers are invalid",
            vec![FieldError::new("answers[0]", "Option does not belong to the question")],
        );
        let problem = problem_for(&err);
        assert_eq!(problem.status, 400);
        assert_eq!(problem.code, "VALIDATION_FAILED");
        assert_eq!(problem.errors.len(), 1);
        assert_eq!(problem.errors[0].field, "answers[0]");
    }

    #[test]
    fn test_invalid_state_transition_is_conflict() {
        let err = AppError::InvalidStateTransition {
            from: "draft".to_string(),
            to: "approve".to_string(),
        };
        let problem = problem_for(&err);
        assert_eq!(problem.status, 409);
        assert_eq!(problem.title, "Conflict");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = AppError::Internal("connection string postgres://secret".to_string());
        let problem = problem_for(&err);
        assert_eq!(problem.status, 500);
        assert!(!problem.detail.contains("secret"));
        assert_eq!(problem.detail, "Internal server error");
    }

    #[test]
    fn test_pool_timeout_maps_to_service_unavailable() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        let problem = problem_for(&err);
        assert_eq!(problem.status, 503);
        assert_eq!(problem.code, "DATABASE_UNAVAILABLE");
    }

    #[test]
    fn test_wrapped_pool_error_maps_to_service_unavailable() {
        let source = anyhow::Error::new(sqlx::Error::PoolClosed).context("Failed to claim message");
        let err = AppError::from(source);
        assert_eq!(problem_for(&err).status, 503);
    }

    #[test]
    fn test_other_database_errors_stay_internal() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let problem = problem_for(&err);
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail, "Failed to access database");
    }

    #[test]
    fn test_response_uses_problem_content_type() {
        let response = HttpAppError(AppError::NotFound("Firm not found".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_JSON
        );
    }
}
