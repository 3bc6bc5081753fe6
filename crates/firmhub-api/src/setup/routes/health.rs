//! Liveness and readiness probes.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}

/// Runs one dependency check under [`TIMEOUT`]; `Err` carries the reported state.
async fn probe<F, E>(name: &'static str, check: F) -> Result<(), String>
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(TIMEOUT, check).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!(dependency = name, error = %e, "Readiness check failed");
            Err(format!("not_ready: {}", e))
        }
        Err(_) => {
            tracing::error!(dependency = name, "Readiness check timed out");
            Err("timeout".to_string())
        }
    }
}

/// Both the database and the token store must answer. Without the token store every
/// authenticated request is rejected.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (database, token_store) = tokio::join!(
        probe("database", async {
            sqlx::query("SELECT 1")
                .execute(&state.db.pool)
                .await
                .map(|_| ())
        }),
        probe("token_store", state.auth.token_store.ping()),
    );

    let ready = database.is_ok() && token_store.is_ok();
    let describe = |result: Result<(), String>| -> Value {
        match result {
            Ok(()) => json!("ready"),
            Err(state) => json!(state),
        }
    };
    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "database": describe(database),
        "token_store": describe(token_store),
    });
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
