//! Firm media: upload into quarantine, listing, download links and deletion.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeUser};
use crate::error::HttpAppError;
use crate::services::media;
use crate::state::AppState;
use crate::utils::upload::extract_multipart_file;
use firmhub_core::models::{MediaResponse, MediaUrlResponse};
use firmhub_infra::ProblemDetails;

/// Upload a file for a firm
///
/// The file is stored in quarantine and scanned in the background. It becomes
/// downloadable once the scan succeeds; the uploader is notified over the event stream.
#[utoipa::path(
    post,
    path = "/api/firms/{id}/media",
    params(("id" = Uuid, Path, description = "Firm ID")),
    request_body(content_type = "multipart/form-data", description = "Form with a single `file` field"),
    responses(
        (status = 202, description = "Upload accepted, scan pending", body = MediaResponse),
        (status = 400, description = "Invalid file type or extension", body = ProblemDetails),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 413, description = "File too large", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "media"
)]
#[tracing::instrument(skip(state, user, multipart), fields(user_id = %user.user_id))]
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(firm_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = extract_multipart_file(multipart, state.media.max_file_size).await?;
    let response = media::upload(&state, &user, firm_id, file).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/firms/{id}/media",
    params(("id" = Uuid, Path, description = "Firm ID")),
    responses(
        (status = 200, description = "Media of the firm", body = Vec<MediaResponse>),
        (status = 404, description = "Firm not found", body = ProblemDetails)
    ),
    tag = "media"
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(firm_id): Path<Uuid>,
) -> Result<Json<Vec<MediaResponse>>, HttpAppError> {
    Ok(Json(media::list(&state, viewer.as_ref(), firm_id).await?))
}

/// Short-lived download link for a scanned file
#[utoipa::path(
    get,
    path = "/api/media/{id}/url",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Presigned URL", body = MediaUrlResponse),
        (status = 404, description = "Media not found", body = ProblemDetails),
        (status = 409, description = "Scan still pending", body = ProblemDetails)
    ),
    tag = "media"
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn media_url(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaUrlResponse>, HttpAppError> {
    Ok(Json(media::download_url(&state, viewer.as_ref(), id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/media/{id}",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 204, description = "Media deleted"),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 404, description = "Media not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "media"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    media::delete(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
