//! Subscription plans, checkout and payment history.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::services::billing;
use crate::state::AppState;
use firmhub_core::models::{
    CheckoutRequest, CheckoutResponse, FirmSubscription, PaymentRecord, SubscriptionPlan,
};
use firmhub_infra::ProblemDetails;

#[utoipa::path(
    get,
    path = "/api/subscriptions/plans",
    responses((status = 200, description = "Active plans", body = Vec<SubscriptionPlan>)),
    tag = "billing"
)]
#[tracing::instrument(skip(state))]
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubscriptionPlan>>, HttpAppError> {
    Ok(Json(billing::list_plans(&state).await?))
}

/// Start a Stripe checkout for a plan
#[utoipa::path(
    post,
    path = "/api/firms/{id}/subscription/checkout",
    params(("id" = Uuid, Path, description = "Firm ID")),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session to redirect to", body = CheckoutResponse),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 404, description = "Unknown plan", body = ProblemDetails),
        (status = 503, description = "Billing disabled", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "billing"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(firm_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, HttpAppError> {
    Ok(Json(billing::checkout(&state, &user, firm_id, request).await?))
}

/// Cancel the subscription at the end of the paid period
#[utoipa::path(
    post,
    path = "/api/firms/{id}/subscription/cancel",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Cancellation scheduled", body = FirmSubscription),
        (status = 404, description = "No subscription", body = ProblemDetails),
        (status = 503, description = "Billing disabled", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "billing"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(firm_id): Path<Uuid>,
) -> Result<Json<FirmSubscription>, HttpAppError> {
    Ok(Json(billing::cancel(&state, &user, firm_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/firms/{id}/subscription",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Current subscription", body = FirmSubscription),
        (status = 404, description = "No subscription", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "billing"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(firm_id): Path<Uuid>,
) -> Result<Json<FirmSubscription>, HttpAppError> {
    Ok(Json(billing::get_subscription(&state, &user, firm_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/firms/{id}/payments",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses((status = 200, description = "Payments, newest first", body = Vec<PaymentRecord>)),
    security(("bearer_auth" = [])),
    tag = "billing"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(firm_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentRecord>>, HttpAppError> {
    Ok(Json(billing::list_payments(&state, &user, firm_id).await?))
}
