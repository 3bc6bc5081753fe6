//! Questionnaire definitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::RequestLanguage;
use crate::state::AppState;
use firmhub_core::models::{LocalizedQuestion, QuestionInput, ReorderRequest};
use firmhub_core::validation::{validate_question_input, validate_reorder};
use firmhub_core::AppError;
use firmhub_infra::ProblemDetails;

async fn ensure_category(state: &AppState, category_id: Uuid) -> Result<(), AppError> {
    state
        .db
        .taxonomy
        .get_category(category_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

/// Questions of a category in display order, in the request language
#[utoipa::path(
    get,
    path = "/api/categories/{id}/questions",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Localized questions", body = Vec<LocalizedQuestion>),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    tag = "questions"
)]
#[tracing::instrument(skip(state))]
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    RequestLanguage(lang): RequestLanguage,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Vec<LocalizedQuestion>>, HttpAppError> {
    ensure_category(&state, category_id).await?;
    let definitions = state.db.questions.load_definitions(category_id).await?;
    Ok(Json(
        definitions
            .iter()
            .map(|d| d.localize(lang, state.default_language))
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/questions",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = QuestionInput,
    responses(
        (status = 201, description = "Question created", body = LocalizedQuestion),
        (status = 400, description = "Invalid question definition", body = ProblemDetails),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, input))]
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(category_id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<QuestionInput>,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_question_input(&input, lang)?;
    ensure_category(&state, category_id).await?;
    let definition = state.db.questions.create(category_id, &input).await?;
    tracing::info!(question_id = %definition.question.id, category_id = %category_id, "Question created");
    Ok((
        StatusCode::CREATED,
        Json(definition.localize(lang, state.default_language)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/questions/{id}",
    params(("id" = Uuid, Path, description = "Question ID")),
    request_body = QuestionInput,
    responses(
        (status = 200, description = "Question updated", body = LocalizedQuestion),
        (status = 400, description = "Invalid question definition", body = ProblemDetails),
        (status = 404, description = "Question not found", body = ProblemDetails),
        (status = 409, description = "Answered question cannot change type", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, input))]
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<QuestionInput>,
) -> Result<Json<LocalizedQuestion>, HttpAppError> {
    validate_question_input(&input, lang)?;
    let definition = state
        .db
        .questions
        .update(id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    Ok(Json(definition.localize(lang, state.default_language)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/questions/{id}",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 204, description = "Question deleted, remaining questions renumbered"),
        (status = 404, description = "Question not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    if !state.db.questions.delete(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Reorder every question of a category
///
/// The request must list each question exactly once with positions `1..=n`.
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}/questions/order",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = ReorderRequest,
    responses(
        (status = 204, description = "Questions reordered"),
        (status = 400, description = "Positions are not contiguous or ids do not match", body = ProblemDetails),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn reorder_questions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(category_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReorderRequest>,
) -> Result<StatusCode, HttpAppError> {
    ensure_category(&state, category_id).await?;
    let existing = state.db.questions.question_ids(category_id).await?;
    validate_reorder(&existing, &request.items, lang)?;
    state
        .db
        .questions
        .reorder_questions(category_id, &request.items)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reorder the options of a choice question
#[utoipa::path(
    put,
    path = "/api/admin/questions/{id}/options/order",
    params(("id" = Uuid, Path, description = "Question ID")),
    request_body = ReorderRequest,
    responses(
        (status = 204, description = "Options reordered"),
        (status = 400, description = "Positions are not contiguous or ids do not match", body = ProblemDetails),
        (status = 404, description = "Question not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn reorder_options(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(question_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReorderRequest>,
) -> Result<StatusCode, HttpAppError> {
    if state.db.questions.load_definition(question_id).await?.is_none() {
        return Err(AppError::NotFound("Question not found".to_string()).into());
    }
    let existing = state.db.questions.option_ids(question_id).await?;
    validate_reorder(&existing, &request.items, lang)?;
    state
        .db
        .questions
        .reorder_options(question_id, &request.items)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
