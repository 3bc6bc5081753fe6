//! OpenAPI documentation, served at `/api/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;
use crate::services::accounts;
use firmhub_core::models;
use firmhub_core::Language;
use firmhub_infra::ProblemDetails;

/// Registers the `bearer_auth` scheme referenced by protected operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                Http::builder()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Firmhub API",
        version = "0.1.0",
        description = "B2B marketplace API: firm profiles, service taxonomy, category questionnaires, moderation, media and subscriptions. Errors are returned as application/problem+json. Localized content follows the Accept-Language header (en, fr, de)."
    ),
    modifiers(&BearerAuth),
    paths(
        // Accounts
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::revoke_all,
        handlers::auth::me,
        // Taxonomy
        handlers::taxonomy::list_clusters,
        handlers::taxonomy::list_categories,
        handlers::taxonomy::get_category,
        handlers::taxonomy::list_services,
        handlers::taxonomy::create_cluster,
        handlers::taxonomy::update_cluster,
        handlers::taxonomy::delete_cluster,
        handlers::taxonomy::create_category,
        handlers::taxonomy::update_category,
        handlers::taxonomy::delete_category,
        handlers::taxonomy::create_service,
        handlers::taxonomy::update_service,
        handlers::taxonomy::delete_service,
        // Questions
        handlers::questions::list_questions,
        handlers::questions::create_question,
        handlers::questions::update_question,
        handlers::questions::delete_question,
        handlers::questions::reorder_questions,
        handlers::questions::reorder_options,
        // Firms
        handlers::firms::create_firm,
        handlers::firms::list_firms,
        handlers::firms::my_firms,
        handlers::firms::get_firm,
        handlers::firms::update_firm,
        handlers::firms::update_services,
        handlers::firms::submit_firm,
        // Forms
        handlers::forms::get_form,
        handlers::forms::submit_answers,
        // Media
        handlers::media::upload_media,
        handlers::media::list_media,
        handlers::media::media_url,
        handlers::media::delete_media,
        // Administration
        handlers::admin::list_firms,
        handlers::admin::approve_firm,
        handlers::admin::reject_firm,
        handlers::admin::suspend_firm,
        handlers::admin::reinstate_firm,
        handlers::admin::list_users,
        handlers::admin::revoke_user_tokens,
        // Billing
        handlers::billing::list_plans,
        handlers::billing::checkout,
        handlers::billing::cancel,
        handlers::billing::get_subscription,
        handlers::billing::list_payments,
        handlers::webhooks::stripe_webhook,
        // Notifications
        handlers::notifications::stream,
    ),
    components(
        schemas(
            Language,
            // Accounts
            models::UserRole,
            models::UserResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::RefreshRequest,
            models::TokenPair,
            accounts::AuthResponse,
            accounts::LogoutRequest,
            accounts::RevocationResponse,
            // Taxonomy
            models::TaxonomyTranslation,
            models::LocalizedNode,
            models::UpsertTaxonomyRequest,
            // Questions
            models::QuestionType,
            models::LocalizedQuestion,
            models::LocalizedOption,
            models::QuestionInput,
            models::OptionInput,
            models::OrderItem,
            models::ReorderRequest,
            // Firms
            models::FirmStatus,
            models::Firm,
            models::FirmDetails,
            models::FirmContact,
            models::FirmLinks,
            models::FirmLocation,
            models::CreateFirmRequest,
            models::UpdateFirmRequest,
            models::UpdateFirmServicesRequest,
            models::RejectFirmRequest,
            // Forms
            models::AnswerInput,
            models::SubmitAnswersRequest,
            models::StoredAnswer,
            models::FormQuestionView,
            models::FormView,
            models::FormSubmission,
            // Media
            models::MediaStatus,
            models::MediaResponse,
            models::MediaUrlResponse,
            // Billing
            models::SubscriptionPlan,
            models::SubscriptionStatus,
            models::FirmSubscription,
            models::PaymentRecord,
            models::CheckoutRequest,
            models::CheckoutResponse,
            // Errors
            ProblemDetails,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and token management"),
        (name = "taxonomy", description = "Clusters, categories and services"),
        (name = "questions", description = "Category questionnaires"),
        (name = "firms", description = "Firm profiles and submission for review"),
        (name = "forms", description = "Questionnaire answers of a firm"),
        (name = "media", description = "Firm files with background virus scanning"),
        (name = "admin", description = "Moderation, taxonomy and account administration"),
        (name = "billing", description = "Subscription plans, checkout and Stripe webhooks"),
        (name = "notifications", description = "Server-sent event stream")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_protected_operation_has_a_known_scheme() {
        let spec = get_openapi_spec();
        let schemes = spec
            .components
            .as_ref()
            .map(|c| c.security_schemes.clone())
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer_auth"));
        assert!(spec.paths.paths.contains_key("/api/firms/{id}/submit"));
        assert!(spec.paths.paths.contains_key("/api/webhooks/stripe"));
    }
}
