//! Token and account helpers.

use axum_test::TestServer;
use firmhub_api::state::AppState;
use firmhub_core::models::UserRole;
use serde_json::{json, Value};
use uuid::Uuid;

pub struct TestUser {
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Sign a token directly, without an account row.
pub fn issue_token(state: &AppState, user_id: Uuid, role: UserRole) -> String {
    state
        .auth
        .jwt
        .issue(user_id, role)
        .expect("Failed to issue token")
        .token
}

/// Register through the API and return the issued tokens.
#[allow(dead_code)]
pub async fn register_user(client: &TestServer, email: &str) -> TestUser {
    let response = client
        .post("/api/auth/register")
        .json(&json!({
            "email": email,
            "password": "correct-horse-battery",
            "display_name": "Test User",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    TestUser {
        id: body["user"]["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("user id in response"),
        access_token: body["tokens"]["access_token"]
            .as_str()
            .expect("access token in response")
            .to_string(),
        refresh_token: body["tokens"]["refresh_token"]
            .as_str()
            .expect("refresh token in response")
            .to_string(),
    }
}
