//! Route configuration and setup.
//!
//! Domain route groups live in [domains](domains); health checks in [health](health).

mod domains;
mod health;

use crate::auth::{auth_middleware, optional_auth_middleware};
use crate::constants::DEFAULT_HTTP_CONCURRENCY_LIMIT;
use crate::middleware::{language_middleware, request_id_middleware, security_headers_middleware};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use firmhub_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let public_routes = public_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(state.auth.clone(), optional_auth_middleware),
    );
    let protected_routes = protected_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(state.auth.clone(), auth_middleware),
    );

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = unauthenticated_routes(state.clone())
        .merge(public_routes)
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(axum::middleware::from_fn_with_state(
            state.default_language,
            language_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(
            config.max_upload_size_bytes() + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Probes, the OpenAPI document and provider webhooks. No token is read.
fn unauthenticated_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(domains::webhook_routes(state.clone()))
        .with_state(state)
}

/// Readable anonymously; a valid bearer token widens what is visible.
fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(domains::account_public_routes(state.clone()))
        .merge(domains::catalog_routes(state.clone()))
        .merge(domains::firm_public_routes(state.clone()))
        .merge(domains::plan_routes(state.clone()))
        .with_state(state)
}

fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(domains::account_routes(state.clone()))
        .merge(domains::firm_routes(state.clone()))
        .merge(domains::media_routes(state.clone()))
        .merge(domains::billing_routes(state.clone()))
        .merge(domains::notification_routes(state.clone()))
        .merge(domains::admin_routes(state.clone()))
        .with_state(state)
}
