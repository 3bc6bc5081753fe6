//! Cross-cutting HTTP behavior: probes, problem bodies, language negotiation and headers.
//!
//! Run with: `cargo test -p firmhub-api --test http_test`

mod helpers;

use axum::http::StatusCode;
use helpers::setup_test_app;
use serde_json::Value;

#[tokio::test]
async fn test_liveness_probe() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_malformed_json_is_a_problem_document() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/auth/register")
        .add_header("Content-Type", "application/json")
        .text("{\"email\": ")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/problem+json"
    );
    let body: Value = response.json();
    assert_eq!(body["status"], 400);
    assert!(body["detail"].as_str().is_some());
}

#[tokio::test]
async fn test_field_validation_lists_offending_fields() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/auth/register")
        .json(&serde_json::json!({ "email": "not-an-email", "password": "short" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .expect("field errors")
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_accept_language_selects_response_language() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/health")
        .add_header("Accept-Language", "fr-CH, fr;q=0.9, en;q=0.8")
        .await;

    assert_eq!(response.header("content-language").to_str().unwrap(), "fr");
}

#[tokio::test]
async fn test_lang_query_overrides_header() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/health?lang=de")
        .add_header("Accept-Language", "fr")
        .await;

    assert_eq!(response.header("content-language").to_str().unwrap(), "de");
}

#[tokio::test]
async fn test_unsupported_language_falls_back_to_default() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/health")
        .add_header("Accept-Language", "ja")
        .await;

    assert_eq!(response.header("content-language").to_str().unwrap(), "en");
}

#[tokio::test]
async fn test_request_id_and_security_headers() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert!(!response.header("x-request-id").is_empty());
    assert_eq!(response.header("x-frame-options").to_str().unwrap(), "DENY");
}

#[tokio::test]
async fn test_stripe_webhook_without_billing_is_unavailable() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/webhooks/stripe")
        .add_header("Stripe-Signature", "t=1,v1=abc")
        .text("{}")
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/api/firms/{id}/forms/{category_id}/answers"].is_object());
}
