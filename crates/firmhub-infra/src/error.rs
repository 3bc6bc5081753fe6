//! Problem-details response body (RFC 9457)
//!
//! Rendering from `AppError` lives in firmhub-api: axum's `IntoResponse` cannot be
//! implemented here for a type owned by firmhub-core.

use firmhub_core::FieldError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PROBLEM_JSON: &str = "application/problem+json";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Machine-readable error code, e.g. `VALIDATION_ERROR`.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ProblemDetails {
    pub fn new(status: u16, code: &str, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            problem_type: format!("/problems/{}", code.to_lowercase().replace('_', "-")),
            title: title.into(),
            status,
            detail: detail.into(),
            code: code.to_string(),
            trace_id: None,
            errors: Vec::new(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_type_derived_from_code() {
        let problem = ProblemDetails::new(409, "INVALID_STATE_TRANSITION", "Conflict", "nope");
        assert_eq!(problem.problem_type, "/problems/invalid-state-transition");
    }

    #[test]
    fn test_empty_errors_are_omitted() {
        let value = serde_json::to_value(ProblemDetails::new(404, "NOT_FOUND", "Not Found", "x"))
            .unwrap();
        assert!(value.get("errors").is_none());
        assert!(value.get("trace_id").is_none());
        assert_eq!(value["type"], "/problems/not-found");
    }
}
