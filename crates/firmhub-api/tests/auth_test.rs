//! Bearer authentication, revocation and the fail-secure token store.
//!
//! Run with: `cargo test -p firmhub-api --test auth_test`

mod helpers;

use axum::http::StatusCode;
use firmhub_core::models::UserRole;
use firmhub_services::TokenStore;
use helpers::auth::issue_token;
use helpers::setup_test_app;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/admin/users").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/problem+json"
    );
}

#[tokio::test]
async fn test_malformed_token_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_token_reaches_role_check() {
    let app = setup_test_app().await;
    let token = issue_token(&app.state, Uuid::new_v4(), UserRole::Member);

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blacklisted_token_is_rejected() {
    let app = setup_test_app().await;
    let token = issue_token(&app.state, Uuid::new_v4(), UserRole::Member);
    app.token_store
        .blacklist(&token, Duration::from_secs(60))
        .await
        .unwrap();

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_issued_before_revoke_all_is_rejected() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();
    let token = issue_token(&app.state, user_id, UserRole::Member);
    let later = chrono::Utc::now().timestamp_millis() + 5_000;
    app.token_store
        .revoke_all(user_id, later, Duration::from_secs(60))
        .await
        .unwrap();

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revocation_does_not_affect_other_users() {
    let app = setup_test_app().await;
    let later = chrono::Utc::now().timestamp_millis() + 5_000;
    app.token_store
        .revoke_all(Uuid::new_v4(), later, Duration::from_secs(60))
        .await
        .unwrap();
    let token = issue_token(&app.state, Uuid::new_v4(), UserRole::Member);

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_store_outage_fails_closed() {
    let app = setup_test_app().await;
    let token = issue_token(&app.state, Uuid::new_v4(), UserRole::Member);
    app.token_store.set_unavailable(true);

    let response = app
        .client()
        .get("/api/admin/users")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_on_public_route_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/subscriptions/plans")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repeated_failures_are_throttled() {
    let app = setup_test_app().await;

    let mut last = StatusCode::OK;
    for _ in 0..12 {
        let response = app
            .client()
            .get("/api/admin/users")
            .add_header("Authorization", "Bearer not-a-jwt")
            .await;
        last = response.status_code();
    }

    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
}
