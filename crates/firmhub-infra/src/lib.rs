//! Firmhub Infrastructure Library
//!
//! Shared infrastructure used by the HTTP server:
//! - Middleware (request ID propagation, security headers)
//! - Telemetry initialization
//! - The problem-details response body

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "middleware")]
pub use middleware::{
    current_request_id, get_request_id, request_id_middleware, security_headers_middleware,
    RequestId,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use error::{ProblemDetails, PROBLEM_JSON};
