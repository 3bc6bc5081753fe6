//! Account and session handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::services::accounts::{self, AuthResponse, LogoutRequest, RevocationResponse};
use crate::state::AppState;
use crate::utils::client_ip::ClientIp;
use firmhub_core::models::{LoginRequest, RefreshRequest, RegisterRequest, TokenPair, UserResponse};
use firmhub_core::AppError;
use firmhub_infra::ProblemDetails;

/// Create an account and sign in
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid registration data", body = ProblemDetails),
        (status = 409, description = "Email already registered", body = ProblemDetails)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let response = accounts::register(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ProblemDetails),
        (status = 403, description = "Account disabled", body = ProblemDetails)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, HttpAppError> {
    request.validate()?;
    Ok(Json(accounts::login(&state, request).await?))
}

/// Exchange a refresh token for a new token pair
///
/// The presented token is consumed. Presenting it a second time revokes every session of
/// the account.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid, expired or reused refresh token", body = ProblemDetails)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, HttpAppError> {
    if request.refresh_token.trim().is_empty() {
        return Err(AppError::InvalidInput("refresh_token is required".to_string()).into());
    }
    let tokens = accounts::refresh(&state, request.refresh_token.trim(), Some(ip)).await?;
    Ok(Json(tokens))
}

/// Revoke the current access token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body(content = LogoutRequest, description = "Optional refresh token to revoke"),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not authenticated", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    request: Option<Json<LogoutRequest>>,
) -> Result<StatusCode, HttpAppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    accounts::logout(&state, &user, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every access and refresh token of the caller
#[utoipa::path(
    post,
    path = "/api/auth/revoke-all",
    responses(
        (status = 200, description = "All sessions revoked", body = RevocationResponse),
        (status = 401, description = "Not authenticated", body = ProblemDetails),
        (status = 503, description = "Token store unavailable", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn revoke_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<RevocationResponse>, HttpAppError> {
    Ok(Json(
        accounts::revoke_all(&state, user.user_id, user.user_id).await?,
    ))
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, HttpAppError> {
    let account = state
        .db
        .users
        .get_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from(account)))
}
