//! Inbound provider webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::error::HttpAppError;
use crate::services::billing::{self, WebhookOutcome};
use crate::state::AppState;
use firmhub_infra::ProblemDetails;

const STRIPE_SIGNATURE: &str = "stripe-signature";

/// Stripe event delivery
///
/// The raw body is verified against the `Stripe-Signature` header before it is parsed.
/// Deliveries already processed are acknowledged without effect.
#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    request_body(content = String, content_type = "application/json", description = "Stripe event"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Invalid signature or payload", body = ProblemDetails),
        (status = 503, description = "Billing disabled", body = ProblemDetails)
    ),
    tag = "billing"
)]
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|v| v.to_str().ok());
    let outcome = billing::handle_webhook(&state, &body, signature).await?;
    Ok(Json(serde_json::json!({
        "received": true,
        "duplicate": outcome == WebhookOutcome::Duplicate,
    })))
}
