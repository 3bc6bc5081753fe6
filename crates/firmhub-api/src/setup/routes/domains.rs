//! Domain route groups.

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn account_public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/auth/register", API_PREFIX), post(handlers::auth::register))
        .route(&format!("{}/auth/login", API_PREFIX), post(handlers::auth::login))
        .route(&format!("{}/auth/refresh", API_PREFIX), post(handlers::auth::refresh))
        .with_state(state)
}

pub fn account_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/auth/logout", API_PREFIX), post(handlers::auth::logout))
        .route(&format!("{}/auth/revoke-all", API_PREFIX), post(handlers::auth::revoke_all))
        .route(&format!("{}/auth/me", API_PREFIX), get(handlers::auth::me))
        .with_state(state)
}

/// Taxonomy and questionnaires, localized by the request language.
pub fn catalog_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/clusters", API_PREFIX), get(handlers::taxonomy::list_clusters))
        .route(&format!("{}/categories", API_PREFIX), get(handlers::taxonomy::list_categories))
        .route(
            &format!("{}/categories/{{id}}", API_PREFIX),
            get(handlers::taxonomy::get_category),
        )
        .route(
            &format!("{}/categories/{{id}}/questions", API_PREFIX),
            get(handlers::questions::list_questions),
        )
        .route(&format!("{}/services", API_PREFIX), get(handlers::taxonomy::list_services))
        .with_state(state)
}

pub fn firm_public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/firms", API_PREFIX), get(handlers::firms::list_firms))
        .route(&format!("{}/firms/{{id}}", API_PREFIX), get(handlers::firms::get_firm))
        .route(
            &format!("{}/firms/{{id}}/forms/{{category_id}}", API_PREFIX),
            get(handlers::forms::get_form),
        )
        .route(&format!("{}/firms/{{id}}/media", API_PREFIX), get(handlers::media::list_media))
        .route(&format!("{}/media/{{id}}/url", API_PREFIX), get(handlers::media::media_url))
        .with_state(state)
}

pub fn firm_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/firms", API_PREFIX), post(handlers::firms::create_firm))
        .route(&format!("{}/firms/mine", API_PREFIX), get(handlers::firms::my_firms))
        .route(&format!("{}/firms/{{id}}", API_PREFIX), put(handlers::firms::update_firm))
        .route(
            &format!("{}/firms/{{id}}/services", API_PREFIX),
            put(handlers::firms::update_services),
        )
        .route(
            &format!("{}/firms/{{id}}/submit", API_PREFIX),
            post(handlers::firms::submit_firm),
        )
        .route(
            &format!("{}/firms/{{id}}/forms/{{category_id}}/answers", API_PREFIX),
            put(handlers::forms::submit_answers),
        )
        .with_state(state)
}

pub fn media_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/firms/{{id}}/media", API_PREFIX),
            post(handlers::media::upload_media),
        )
        .route(&format!("{}/media/{{id}}", API_PREFIX), delete(handlers::media::delete_media))
        .with_state(state)
}

pub fn plan_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/subscriptions/plans", API_PREFIX),
            get(handlers::billing::list_plans),
        )
        .with_state(state)
}

pub fn billing_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/firms/{{id}}/subscription", API_PREFIX),
            get(handlers::billing::get_subscription),
        )
        .route(
            &format!("{}/firms/{{id}}/subscription/checkout", API_PREFIX),
            post(handlers::billing::checkout),
        )
        .route(
            &format!("{}/firms/{{id}}/subscription/cancel", API_PREFIX),
            post(handlers::billing::cancel),
        )
        .route(
            &format!("{}/firms/{{id}}/payments", API_PREFIX),
            get(handlers::billing::list_payments),
        )
        .with_state(state)
}

pub fn webhook_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/webhooks/stripe", API_PREFIX),
            post(handlers::webhooks::stripe_webhook),
        )
        .with_state(state)
}

pub fn notification_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/notifications/stream", API_PREFIX),
            get(handlers::notifications::stream),
        )
        .with_state(state)
}

pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Taxonomy
        .route(
            &format!("{}/admin/clusters", API_PREFIX),
            post(handlers::taxonomy::create_cluster),
        )
        .route(
            &format!("{}/admin/clusters/{{id}}", API_PREFIX),
            put(handlers::taxonomy::update_cluster).delete(handlers::taxonomy::delete_cluster),
        )
        .route(
            &format!("{}/admin/categories", API_PREFIX),
            post(handlers::taxonomy::create_category),
        )
        .route(
            &format!("{}/admin/categories/{{id}}", API_PREFIX),
            put(handlers::taxonomy::update_category).delete(handlers::taxonomy::delete_category),
        )
        .route(
            &format!("{}/admin/services", API_PREFIX),
            post(handlers::taxonomy::create_service),
        )
        .route(
            &format!("{}/admin/services/{{id}}", API_PREFIX),
            put(handlers::taxonomy::update_service).delete(handlers::taxonomy::delete_service),
        )
        // Questions
        .route(
            &format!("{}/admin/categories/{{id}}/questions", API_PREFIX),
            post(handlers::questions::create_question),
        )
        .route(
            &format!("{}/admin/categories/{{id}}/questions/order", API_PREFIX),
            put(handlers::questions::reorder_questions),
        )
        .route(
            &format!("{}/admin/questions/{{id}}", API_PREFIX),
            put(handlers::questions::update_question).delete(handlers::questions::delete_question),
        )
        .route(
            &format!("{}/admin/questions/{{id}}/options/order", API_PREFIX),
            put(handlers::questions::reorder_options),
        )
        // Moderation
        .route(&format!("{}/admin/firms", API_PREFIX), get(handlers::admin::list_firms))
        .route(
            &format!("{}/admin/firms/{{id}}/approve", API_PREFIX),
            post(handlers::admin::approve_firm),
        )
        .route(
            &format!("{}/admin/firms/{{id}}/reject", API_PREFIX),
            post(handlers::admin::reject_firm),
        )
        .route(
            &format!("{}/admin/firms/{{id}}/suspend", API_PREFIX),
            post(handlers::admin::suspend_firm),
        )
        .route(
            &format!("{}/admin/firms/{{id}}/reinstate", API_PREFIX),
            post(handlers::admin::reinstate_firm),
        )
        // Accounts
        .route(&format!("{}/admin/users", API_PREFIX), get(handlers::admin::list_users))
        .route(
            &format!("{}/admin/users/{{id}}/revoke-tokens", API_PREFIX),
            post(handlers::admin::revoke_user_tokens),
        )
        .with_state(state)
}
