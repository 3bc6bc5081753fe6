//! Moderation and account administration.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::services::accounts::{self, RevocationResponse};
use crate::services::firms;
use crate::state::AppState;
use crate::utils::pagination::page;
use firmhub_core::models::{
    Firm, FirmAction, FirmListQuery, FirmStatus, RejectFirmRequest, UserResponse,
};
use firmhub_infra::ProblemDetails;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Firms in any status; defaults to the review queue
#[utoipa::path(
    get,
    path = "/api/admin/firms",
    params(FirmListQuery),
    responses((status = 200, description = "Firms", body = Vec<Firm>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn list_firms(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<FirmListQuery>,
) -> Result<Json<Vec<Firm>>, HttpAppError> {
    let status = query.status.unwrap_or(FirmStatus::AwaitingReview);
    let (limit, offset) = page(query.limit, query.offset);
    let firms = state
        .db
        .firms
        .list_by_status(&[status], limit, offset)
        .await?;
    Ok(Json(firms))
}

async fn review(
    state: &AppState,
    admin: &AdminUser,
    firm_id: Uuid,
    action: FirmAction,
    reason: Option<&str>,
) -> Result<Json<Firm>, HttpAppError> {
    let firm = firms::review(state, &admin.0, firm_id, action, reason).await?;
    Ok(Json(firm))
}

#[utoipa::path(
    post,
    path = "/api/admin/firms/{id}/approve",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Firm approved", body = Firm),
        (status = 404, description = "Firm not found", body = ProblemDetails),
        (status = 409, description = "Firm is not awaiting review", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn approve_firm(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Firm>, HttpAppError> {
    review(&state, &admin, id, FirmAction::Approve, None).await
}

#[utoipa::path(
    post,
    path = "/api/admin/firms/{id}/reject",
    params(("id" = Uuid, Path, description = "Firm ID")),
    request_body = RejectFirmRequest,
    responses(
        (status = 200, description = "Firm rejected", body = Firm),
        (status = 400, description = "Missing reason", body = ProblemDetails),
        (status = 409, description = "Firm is not awaiting review", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin, request), fields(admin_id = %admin.0.user_id))]
pub async fn reject_firm(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RejectFirmRequest>,
) -> Result<Json<Firm>, HttpAppError> {
    request.validate()?;
    review(&state, &admin, id, FirmAction::Reject, Some(request.reason.trim())).await
}

#[utoipa::path(
    post,
    path = "/api/admin/firms/{id}/suspend",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Firm suspended", body = Firm),
        (status = 409, description = "Firm is not published", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn suspend_firm(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Firm>, HttpAppError> {
    review(&state, &admin, id, FirmAction::Suspend, None).await
}

#[utoipa::path(
    post,
    path = "/api/admin/firms/{id}/reinstate",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Firm active again", body = Firm),
        (status = 409, description = "Firm is not suspended", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn reinstate_firm(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Firm>, HttpAppError> {
    review(&state, &admin, id, FirmAction::Reinstate, None).await
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PageQuery),
    responses((status = 200, description = "Users", body = Vec<UserResponse>)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<UserResponse>>, HttpAppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let users = state.db.users.list(limit, offset).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Revoke every access and refresh token of a user
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/revoke-tokens",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Tokens revoked", body = RevocationResponse),
        (status = 404, description = "User not found", body = ProblemDetails),
        (status = 503, description = "Token store unavailable", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.user_id))]
pub async fn revoke_user_tokens(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RevocationResponse>, HttpAppError> {
    if state.db.users.get_by_id(id).await?.is_none() {
        return Err(firmhub_core::AppError::NotFound("User not found".to_string()).into());
    }
    Ok(Json(accounts::revoke_all(&state, id, admin.0.user_id).await?))
}
