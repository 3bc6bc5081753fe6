//! Firm profile handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::RequestLanguage;
use crate::services::firms;
use crate::state::AppState;
use crate::utils::pagination::page;
use firmhub_core::models::{
    CreateFirmRequest, Firm, FirmDetails, FirmListQuery, FirmStatus, UpdateFirmRequest,
    UpdateFirmServicesRequest,
};
use firmhub_core::AppError;
use firmhub_infra::ProblemDetails;

#[utoipa::path(
    post,
    path = "/api/firms",
    request_body = CreateFirmRequest,
    responses(
        (status = 201, description = "Draft firm created", body = Firm),
        (status = 400, description = "Invalid firm", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "firms"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn create_firm(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateFirmRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let firm = firms::create_firm(&state, &user, request).await?;
    tracing::info!(firm_id = %firm.id, "Firm created");
    Ok((StatusCode::CREATED, Json(firm)))
}

/// Published firms (approved or active)
#[utoipa::path(
    get,
    path = "/api/firms",
    params(FirmListQuery),
    responses(
        (status = 200, description = "Published firms", body = Vec<Firm>),
        (status = 400, description = "Status filter is not a published status", body = ProblemDetails)
    ),
    tag = "firms"
)]
#[tracing::instrument(skip(state))]
pub async fn list_firms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FirmListQuery>,
) -> Result<Json<Vec<Firm>>, HttpAppError> {
    let statuses = match query.status {
        Some(status) if status.is_public() => vec![status],
        Some(_) => {
            return Err(AppError::field("status", "Only published firms can be listed").into())
        }
        None => vec![FirmStatus::Approved, FirmStatus::Active],
    };
    let (limit, offset) = page(query.limit, query.offset);
    let firms = state
        .db
        .firms
        .list_by_status(&statuses, limit, offset)
        .await?;
    Ok(Json(firms))
}

/// Firms owned by the caller, in any status
#[utoipa::path(
    get,
    path = "/api/firms/mine",
    responses((status = 200, description = "Caller's firms", body = Vec<Firm>)),
    security(("bearer_auth" = [])),
    tag = "firms"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn my_firms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Firm>>, HttpAppError> {
    Ok(Json(state.db.firms.list_by_owner(user.user_id).await?))
}

/// Firm profile. Unpublished firms are only visible to their owner and administrators.
#[utoipa::path(
    get,
    path = "/api/firms/{id}",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Firm profile", body = FirmDetails),
        (status = 404, description = "Firm not found", body = ProblemDetails)
    ),
    tag = "firms"
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn get_firm(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FirmDetails>, HttpAppError> {
    Ok(Json(firms::get_details(&state, viewer.as_ref(), id).await?))
}

/// Update the profile. Editing a published firm sends it back to review.
#[utoipa::path(
    put,
    path = "/api/firms/{id}",
    params(("id" = Uuid, Path, description = "Firm ID")),
    request_body = UpdateFirmRequest,
    responses(
        (status = 200, description = "Firm updated", body = FirmDetails),
        (status = 400, description = "Invalid profile", body = ProblemDetails),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 404, description = "Firm not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "firms"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn update_firm(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateFirmRequest>,
) -> Result<Json<FirmDetails>, HttpAppError> {
    Ok(Json(firms::update_firm(&state, &user, id, request).await?))
}

#[utoipa::path(
    put,
    path = "/api/firms/{id}/services",
    params(("id" = Uuid, Path, description = "Firm ID")),
    request_body = UpdateFirmServicesRequest,
    responses(
        (status = 200, description = "Selected service ids", body = Vec<Uuid>),
        (status = 400, description = "Unknown services", body = ProblemDetails),
        (status = 403, description = "Not the owner", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "firms"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn update_services(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateFirmServicesRequest>,
) -> Result<Json<Vec<Uuid>>, HttpAppError> {
    Ok(Json(firms::update_services(&state, &user, id, request).await?))
}

/// Submit the firm for moderation
///
/// Every required question of each started form must be answered and the profile must
/// pass the content filter.
#[utoipa::path(
    post,
    path = "/api/firms/{id}/submit",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Firm awaiting review", body = Firm),
        (status = 400, description = "Incomplete forms or inappropriate content", body = ProblemDetails),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 409, description = "Firm cannot be submitted from its current status", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "firms"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn submit_firm(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
) -> Result<Json<Firm>, HttpAppError> {
    Ok(Json(firms::submit_for_review(&state, &user, id, lang).await?))
}
