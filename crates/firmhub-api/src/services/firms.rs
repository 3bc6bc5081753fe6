//! Firm profiles and the moderation workflow.
//!
//! Status changes go through [`FirmStatus::apply`] and are persisted with an optimistic
//! check on the previous status, so two concurrent reviews cannot both win.

use crate::auth::AuthUser;
use crate::middleware::audit;
use crate::notifications::Notification;
use crate::services::billing;
use crate::state::AppState;
use firmhub_core::i18n::translate;
use firmhub_core::messages::EmailMessage;
use firmhub_core::models::{
    CreateFirmRequest, Firm, FirmAction, FirmDetails, FirmStatus, UpdateFirmRequest,
    UpdateFirmServicesRequest,
};
use firmhub_core::validation::missing_required_questions;
use firmhub_core::{AppError, FieldError, Language, MessageKey};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

pub const EVENT_FIRM_STATUS: &str = "firm.status";

pub async fn load_firm(state: &AppState, firm_id: Uuid) -> Result<Firm, AppError> {
    state
        .db
        .firms
        .get_by_id(firm_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Firm not found".to_string()))
}

/// Load a firm the caller may edit. Only the owner edits a firm.
pub async fn load_owned_firm(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
) -> Result<Firm, AppError> {
    let firm = load_firm(state, firm_id).await?;
    if firm.owner_id != user.user_id {
        return Err(AppError::Forbidden(
            "Only the owner can modify this firm".to_string(),
        ));
    }
    Ok(firm)
}

/// Whether `viewer` may see `firm`: published firms are public, the rest is limited to
/// the owner and administrators.
pub fn can_view(firm: &Firm, viewer: Option<&AuthUser>) -> bool {
    firm.status.is_public()
        || viewer.is_some_and(|u| u.is_admin() || u.user_id == firm.owner_id)
}

pub async fn load_visible_firm(
    state: &AppState,
    viewer: Option<&AuthUser>,
    firm_id: Uuid,
) -> Result<Firm, AppError> {
    let firm = load_firm(state, firm_id).await?;
    if !can_view(&firm, viewer) {
        return Err(AppError::NotFound("Firm not found".to_string()));
    }
    Ok(firm)
}

pub async fn create_firm(
    state: &AppState,
    user: &AuthUser,
    request: CreateFirmRequest,
) -> Result<Firm, AppError> {
    request.validate()?;
    state
        .db
        .firms
        .create(
            user.user_id,
            request.name.trim(),
            request.description.as_deref(),
        )
        .await
}

pub async fn get_details(
    state: &AppState,
    viewer: Option<&AuthUser>,
    firm_id: Uuid,
) -> Result<FirmDetails, AppError> {
    let details = state
        .db
        .firms
        .get_details(firm_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Firm not found".to_string()))?;
    if !can_view(&details.firm, viewer) {
        return Err(AppError::NotFound("Firm not found".to_string()));
    }
    Ok(details)
}

/// Update the profile. A published firm goes back to review.
pub async fn update_firm(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    request: UpdateFirmRequest,
) -> Result<FirmDetails, AppError> {
    request.validate()?;
    let firm = load_owned_firm(state, user, firm_id).await?;

    let next = firm.status.after_edit();
    state
        .db
        .firms
        .update_profile(firm_id, &request, firm.status, next)
        .await?
        .ok_or_else(|| AppError::InvalidStateTransition {
            from: firm.status.to_string(),
            to: next.to_string(),
        })?;
    if next != firm.status {
        tracing::info!(firm_id = %firm_id, from = %firm.status, "Published firm edited, back to review");
    }

    state
        .db
        .firms
        .get_details(firm_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Firm not found".to_string()))
}

pub async fn update_services(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    request: UpdateFirmServicesRequest,
) -> Result<Vec<Uuid>, AppError> {
    let firm = load_owned_firm(state, user, firm_id).await?;

    let mut seen = HashSet::new();
    let requested: Vec<Uuid> = request
        .service_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();

    let existing: HashSet<Uuid> = state
        .db
        .taxonomy
        .existing_service_ids(&requested)
        .await?
        .into_iter()
        .collect();
    let errors: Vec<FieldError> = requested
        .iter()
        .enumerate()
        .filter(|(_, id)| !existing.contains(id))
        .map(|(idx, id)| {
            FieldError::new(
                format!("service_ids[{}]", idx),
                format!("Service {} does not exist", id),
            )
        })
        .collect();
    if !errors.is_empty() {
        return Err(AppError::validation("Unknown services", errors));
    }

    state.db.firms.replace_services(firm_id, &requested).await?;
    mark_edited(state, &firm).await?;

    state.db.firms.service_ids(firm_id).await
}

/// Send a published firm back to review after its content changed.
pub async fn mark_edited(state: &AppState, firm: &Firm) -> Result<(), AppError> {
    let next = firm.status.after_edit();
    if next == firm.status {
        return Ok(());
    }
    if state
        .db
        .firms
        .transition(firm.id, firm.status, next, None, None)
        .await?
        .is_none()
    {
        tracing::warn!(firm_id = %firm.id, "Firm status changed while applying an edit");
    }
    Ok(())
}

/// Every required question of every started form must be answered.
async fn check_completeness(state: &AppState, firm_id: Uuid, lang: Language) -> Result<(), AppError> {
    let categories = state.db.answers.started_categories(firm_id).await?;
    if categories.is_empty() {
        return Ok(());
    }

    let definitions = state
        .db
        .questions
        .load_definitions_for_categories(&categories)
        .await?;
    let answered = state.db.answers.answered_question_ids(firm_id).await?;
    let missing = missing_required_questions(&definitions, &answered);
    if missing.is_empty() {
        return Ok(());
    }

    let message = translate(MessageKey::RequiredQuestionMissing, lang, &[]);
    let errors = missing
        .iter()
        .map(|id| FieldError::new(format!("questions[{}]", id), message.clone()))
        .collect();
    Err(AppError::validation(
        translate(MessageKey::ProfileIncomplete, lang, &[]),
        errors,
    ))
}

/// Profile text and free-text answers must pass the profanity filter.
async fn check_content(state: &AppState, firm: &Firm, lang: Language) -> Result<(), AppError> {
    let texts = state.db.answers.text_answers(firm.id).await?;
    let strings = state.db.answers.string_answers(firm.id).await?;
    let answer_fields: Vec<(String, &str)> = texts
        .iter()
        .map(|(question_id, language, text)| {
            (format!("answers[{}].{}", question_id, language), text.as_str())
        })
        .chain(
            strings
                .iter()
                .map(|(question_id, text)| (format!("answers[{}]", question_id), text.as_str())),
        )
        .collect();

    let mut fields: Vec<(&str, &str)> = vec![("name", firm.name.as_str())];
    if let Some(description) = firm.description.as_deref() {
        fields.push(("description", description));
    }
    fields.extend(answer_fields.iter().map(|(f, t)| (f.as_str(), *t)));

    state.moderation.check_fields(&fields, lang)
}

pub async fn submit_for_review(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    lang: Language,
) -> Result<Firm, AppError> {
    let firm = load_owned_firm(state, user, firm_id).await?;
    let next = firm.status.apply(FirmAction::Submit)?;

    check_completeness(state, firm_id, lang).await?;
    check_content(state, &firm, lang).await?;

    state
        .db
        .firms
        .transition(firm_id, firm.status, next, None, None)
        .await?
        .ok_or_else(|| stale_transition(firm.status, FirmAction::Submit))
}

fn stale_transition(from: FirmStatus, action: FirmAction) -> AppError {
    AppError::InvalidStateTransition {
        from: from.to_string(),
        to: action.to_string(),
    }
}

/// Apply a status change on behalf of an administrator or the billing sync.
/// `reviewer` is recorded for approve and reject.
pub async fn transition(
    state: &AppState,
    firm_id: Uuid,
    action: FirmAction,
    reviewer: Option<Uuid>,
    reason: Option<&str>,
) -> Result<Firm, AppError> {
    let firm = load_firm(state, firm_id).await?;
    let next = firm.status.apply(action)?;
    let reviewer = matches!(action, FirmAction::Approve | FirmAction::Reject)
        .then_some(reviewer)
        .flatten();
    let reason = (action == FirmAction::Reject).then_some(reason).flatten();

    let updated = state
        .db
        .firms
        .transition(firm_id, firm.status, next, reviewer, reason)
        .await?
        .ok_or_else(|| stale_transition(firm.status, action))?;

    notify_owner(state, &updated, action, reason).await;
    Ok(updated)
}

/// Administrative review action (approve, reject, suspend, reinstate).
pub async fn review(
    state: &AppState,
    admin: &AuthUser,
    firm_id: Uuid,
    action: FirmAction,
    reason: Option<&str>,
) -> Result<Firm, AppError> {
    let firm = transition(state, firm_id, action, Some(admin.user_id), reason).await?;
    audit::log_firm_reviewed(firm_id, admin.user_id, &action.to_string());
    if action != FirmAction::Approve {
        return Ok(firm);
    }

    // A firm may have paid before approval, or before an edit sent it back to review.
    let approved = firm.clone();
    match billing::follow_subscription(state, firm).await {
        Ok(firm) => Ok(firm),
        Err(e) => {
            tracing::warn!(error = %e, firm_id = %firm_id, "Approved firm not aligned with its subscription");
            Ok(approved)
        }
    }
}

fn review_email(firm: &Firm, action: FirmAction, reason: Option<&str>, to: String, lang: Language) -> Option<EmailMessage> {
    let key = match action {
        FirmAction::Approve => MessageKey::FirmApprovedBody,
        FirmAction::Reject => MessageKey::FirmRejectedBody,
        FirmAction::Suspend => MessageKey::FirmSuspendedBody,
        FirmAction::Activate | FirmAction::Reinstate => MessageKey::FirmActivatedBody,
        FirmAction::Submit => return None,
    };
    let args = [("firm", firm.name.as_str()), ("reason", reason.unwrap_or("-"))];
    Some(EmailMessage {
        to,
        subject: translate(MessageKey::FirmUpdateSubject, lang, &args),
        body_text: translate(key, lang, &args),
        body_html: None,
    })
}

/// Queue an email to the firm owner. Failures are logged; the status change stands.
async fn notify_owner(state: &AppState, firm: &Firm, action: FirmAction, reason: Option<&str>) {
    state.messaging.notifications.notify(
        firm.owner_id,
        Notification::new(
            EVENT_FIRM_STATUS,
            serde_json::json!({
                "firm_id": firm.id,
                "status": firm.status,
                "reason": reason,
            }),
        ),
    );

    let owner = match state.db.users.get_by_id(firm.owner_id).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, firm_id = %firm.id, "Failed to load firm owner for notification");
            return;
        }
    };

    let Some(email) = review_email(firm, action, reason, owner.email, owner.preferred_language) else {
        return;
    };
    if let Err(e) = state.messaging.queue.publish(&email).await {
        tracing::warn!(error = %e, firm_id = %firm.id, "Failed to queue firm status email");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use firmhub_core::models::UserRole;

    fn firm(status: FirmStatus, owner_id: Uuid) -> Firm {
        Firm {
            id: Uuid::new_v4(),
            owner_id,
            name: "Acme Advisory".to_string(),
            description: None,
            status,
            rejection_reason: None,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(user_id: Uuid, role: UserRole) -> AuthUser {
        AuthUser {
            user_id,
            role,
            token: String::new(),
            expires_at: 0,
        }
    }

    #[test]
    fn test_visibility() {
        let owner = Uuid::new_v4();
        let draft = firm(FirmStatus::Draft, owner);
        assert!(!can_view(&draft, None));
        assert!(!can_view(&draft, Some(&user(Uuid::new_v4(), UserRole::Member))));
        assert!(can_view(&draft, Some(&user(owner, UserRole::Member))));
        assert!(can_view(&draft, Some(&user(Uuid::new_v4(), UserRole::Admin))));
        assert!(can_view(&firm(FirmStatus::Active, owner), None));
    }

    #[test]
    fn test_rejection_email_is_localized_with_reason() {
        let f = firm(FirmStatus::Rejected, Uuid::new_v4());
        let email = review_email(
            &f,
            FirmAction::Reject,
            Some("Missing website"),
            "owner@example.com".to_string(),
            Language::Fr,
        )
        .unwrap();
        assert_eq!(email.subject, "Mise à jour de votre entreprise Acme Advisory");
        assert!(email.body_text.contains("Missing website"));
    }

    #[test]
    fn test_submit_sends_no_email() {
        let f = firm(FirmStatus::AwaitingReview, Uuid::new_v4());
        assert!(review_email(&f, FirmAction::Submit, None, "a@b.c".to_string(), Language::En).is_none());
    }
}
