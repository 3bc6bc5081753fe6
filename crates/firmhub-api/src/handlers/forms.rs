//! Questionnaire answers of a firm.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::RequestLanguage;
use crate::services::answers;
use crate::state::AppState;
use firmhub_core::models::{FormSubmission, FormView, SubmitAnswersRequest};
use firmhub_infra::ProblemDetails;

/// Questions of a category with the firm's stored answers
#[utoipa::path(
    get,
    path = "/api/firms/{id}/forms/{category_id}",
    params(
        ("id" = Uuid, Path, description = "Firm ID"),
        ("category_id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Form with answers", body = FormView),
        (status = 404, description = "Firm or category not found", body = ProblemDetails)
    ),
    tag = "forms"
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    RequestLanguage(lang): RequestLanguage,
    Path((firm_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FormView>, HttpAppError> {
    let view = answers::form_view(&state, viewer.as_ref(), firm_id, category_id, lang).await?;
    Ok(Json(view))
}

/// Save answers for a category
///
/// The whole batch is validated first; nothing is stored when any answer is invalid.
#[utoipa::path(
    put,
    path = "/api/firms/{id}/forms/{category_id}/answers",
    params(
        ("id" = Uuid, Path, description = "Firm ID"),
        ("category_id" = Uuid, Path, description = "Category ID")
    ),
    request_body = SubmitAnswersRequest,
    responses(
        (status = 200, description = "Answers saved", body = FormSubmission),
        (status = 400, description = "Invalid answers, with one entry per offending answer", body = ProblemDetails),
        (status = 403, description = "Not the owner", body = ProblemDetails),
        (status = 404, description = "Firm or category not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "forms"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id, answers = request.answers.len()))]
pub async fn submit_answers(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    RequestLanguage(lang): RequestLanguage,
    Path((firm_id, category_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<SubmitAnswersRequest>,
) -> Result<Json<FormSubmission>, HttpAppError> {
    let submission =
        answers::submit_answers(&state, &user, firm_id, category_id, request, lang).await?;
    Ok(Json(submission))
}
