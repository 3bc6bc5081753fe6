//! Scan lifecycle of uploaded media against a real database and a local object store.
//!
//! Run with: `cargo test -p firmhub-api --test media_scan_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use async_trait::async_trait;
use axum::http::StatusCode;
use firmhub_api::consumers::file_scan::{self, EVENT_MEDIA_AVAILABLE, EVENT_MEDIA_INFECTED};
use firmhub_core::messages::FileUploaded;
use firmhub_core::models::MediaStatus;
use firmhub_db::NewMedia;
use firmhub_services::{ScanError, ScanVerdict, VirusScanner};
use helpers::auth::{register_user, TestUser};
use helpers::{setup_db_app_with_scanner, TestApp};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Answers every scan with the same outcome.
enum FixedScanner {
    Clean,
    Infected,
    Down,
}

#[async_trait]
impl VirusScanner for FixedScanner {
    async fn scan(&self, _data: &[u8]) -> Result<ScanVerdict, ScanError> {
        match self {
            FixedScanner::Clean => Ok(ScanVerdict::Clean),
            FixedScanner::Infected => Ok(ScanVerdict::Infected("Eicar-Test-Signature".to_string())),
            FixedScanner::Down => Err(ScanError::Unavailable("connection refused".to_string())),
        }
    }
}

/// Put a file in quarantine the way an upload does, returning the queued event.
async fn quarantined_upload(app: &TestApp, owner: &TestUser) -> FileUploaded {
    let created = app
        .client()
        .post("/api/firms")
        .add_header("Authorization", owner.bearer())
        .json(&json!({ "name": "Scanned Partners" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let firm_id: Uuid = created.json::<Value>()["id"].as_str().unwrap().parse().unwrap();

    let media_id = Uuid::new_v4();
    let event = FileUploaded {
        media_id,
        firm_id,
        uploaded_by: owner.id,
        temp_key: format!("temp/{}/{}.pdf", firm_id, media_id),
        final_key: format!("firms/{}/{}.pdf", firm_id, media_id),
        content_type: "application/pdf".to_string(),
    };
    app.state
        .media
        .storage
        .put(&event.temp_key, b"%PDF-1.4 brochure".to_vec(), &event.content_type)
        .await
        .unwrap();
    app.state
        .media
        .repository
        .create(NewMedia {
            id: media_id,
            firm_id,
            uploaded_by: owner.id,
            original_filename: "brochure.pdf",
            content_type: &event.content_type,
            file_size: 17,
            temp_key: &event.temp_key,
        })
        .await
        .unwrap();
    event
}

async fn stored(app: &TestApp, key: &str) -> bool {
    app.state.media.storage.exists(key).await.unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clean_file_is_published() {
    let app = setup_db_app_with_scanner(Arc::new(FixedScanner::Clean)).await;
    let owner = register_user(app.client(), "clean@example.com").await;
    let event = quarantined_upload(&app, &owner).await;
    let mut events = app.state.messaging.notifications.subscribe(owner.id);

    file_scan::process(&app.state, &event).await.unwrap();

    let media = app.state.media.repository.get_by_id(event.media_id).await.unwrap().unwrap();
    assert_eq!(media.status, MediaStatus::Available);
    assert_eq!(media.storage_key.as_deref(), Some(event.final_key.as_str()));
    assert!(stored(&app, &event.final_key).await);
    assert!(!stored(&app, &event.temp_key).await);
    assert_eq!(events.recv().await.unwrap().event, EVENT_MEDIA_AVAILABLE);

    // Redelivery of the same event changes nothing.
    file_scan::process(&app.state, &event).await.unwrap();
    assert!(stored(&app, &event.final_key).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_infected_file_is_destroyed() {
    let app = setup_db_app_with_scanner(Arc::new(FixedScanner::Infected)).await;
    let owner = register_user(app.client(), "infected@example.com").await;
    let event = quarantined_upload(&app, &owner).await;
    let mut events = app.state.messaging.notifications.subscribe(owner.id);

    file_scan::process(&app.state, &event).await.unwrap();

    assert!(app.state.media.repository.get_by_id(event.media_id).await.unwrap().is_none());
    assert!(!stored(&app, &event.temp_key).await);
    assert!(!stored(&app, &event.final_key).await);
    assert_eq!(events.recv().await.unwrap().event, EVENT_MEDIA_INFECTED);

    // A retry after the row is gone is a no-op.
    file_scan::process(&app.state, &event).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unavailable_scanner_keeps_file_in_quarantine() {
    let app = setup_db_app_with_scanner(Arc::new(FixedScanner::Down)).await;
    let owner = register_user(app.client(), "down@example.com").await;
    let event = quarantined_upload(&app, &owner).await;

    let err = file_scan::process(&app.state, &event).await.unwrap_err();
    assert!(err.is_recoverable());

    let media = app.state.media.repository.get_by_id(event.media_id).await.unwrap().unwrap();
    assert_eq!(media.status, MediaStatus::Scanning);
    assert!(stored(&app, &event.temp_key).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_media_deleted_before_scan_discards_the_upload() {
    let app = setup_db_app_with_scanner(Arc::new(FixedScanner::Clean)).await;
    let owner = register_user(app.client(), "gone@example.com").await;
    let event = quarantined_upload(&app, &owner).await;
    app.state.media.repository.delete(event.media_id).await.unwrap();

    file_scan::process(&app.state, &event).await.unwrap();

    assert!(!stored(&app, &event.temp_key).await);
    assert!(!stored(&app, &event.final_key).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_quarantined_object_is_not_retried() {
    let app = setup_db_app_with_scanner(Arc::new(FixedScanner::Clean)).await;
    let owner = register_user(app.client(), "missing@example.com").await;
    let event = quarantined_upload(&app, &owner).await;
    app.state.media.storage.delete(&event.temp_key).await.unwrap();

    let err = file_scan::process(&app.state, &event).await.unwrap_err();
    assert!(!err.is_recoverable());
}
