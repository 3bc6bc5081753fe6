//! Questionnaire answers of a firm, one form per category.

use crate::auth::AuthUser;
use crate::services::firms;
use crate::state::AppState;
use firmhub_core::models::{Category, FormQuestionView, FormSubmission, FormView, SubmitAnswersRequest};
use firmhub_core::validation::validate_answers;
use firmhub_core::{AppError, Language};
use uuid::Uuid;

async fn load_category(state: &AppState, category_id: Uuid) -> Result<Category, AppError> {
    state
        .db
        .taxonomy
        .get_category(category_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

/// Validate and store a batch of answers. The batch is all-or-nothing: one invalid
/// answer rejects everything and nothing is written.
pub async fn submit_answers(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    category_id: Uuid,
    request: SubmitAnswersRequest,
    lang: Language,
) -> Result<FormSubmission, AppError> {
    let firm = firms::load_owned_firm(state, user, firm_id).await?;
    load_category(state, category_id).await?;

    let definitions = state.db.questions.load_definitions(category_id).await?;
    let validated = validate_answers(&definitions, &request.answers, lang)?;

    let submission = state
        .db
        .answers
        .save_answers(firm_id, category_id, &validated)
        .await?;
    firms::mark_edited(state, &firm).await?;

    tracing::info!(
        firm_id = %firm_id,
        category_id = %category_id,
        answers = validated.len(),
        "Answers saved"
    );
    Ok(submission)
}

/// The category's questions in `lang` with the firm's current answers.
pub async fn form_view(
    state: &AppState,
    viewer: Option<&AuthUser>,
    firm_id: Uuid,
    category_id: Uuid,
    lang: Language,
) -> Result<FormView, AppError> {
    firms::load_visible_firm(state, viewer, firm_id).await?;
    load_category(state, category_id).await?;

    let mut definitions = state.db.questions.load_definitions(category_id).await?;
    definitions.sort_by_key(|d| d.question.position);
    let mut answers = state.db.answers.load_answers(firm_id, category_id).await?;

    let questions = definitions
        .iter()
        .map(|definition| FormQuestionView {
            question: definition.localize(lang, state.default_language),
            answer: answers.remove(&definition.question.id),
        })
        .collect();

    Ok(FormView {
        firm_id,
        category_id,
        language: lang,
        questions,
    })
}
