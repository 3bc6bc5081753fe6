//! Registration, login, refresh-token rotation and revocation.

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{generate_refresh_token, hash_refresh_token};
use crate::auth::AuthUser;
use crate::middleware::audit;
use crate::state::AppState;
use chrono::{Duration, Utc};
use firmhub_core::models::{
    LoginRequest, RegisterRequest, TokenPair, User, UserResponse, UserRole,
};
use firmhub_core::AppError;
use firmhub_db::Rotation;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Also revoke this refresh token.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevocationResponse {
    pub user_id: Uuid,
    pub refresh_tokens_revoked: u64,
}

fn is_admin_email(state: &AppState, email: &str) -> bool {
    state
        .accounts
        .admin_emails
        .iter()
        .any(|admin| admin.eq_ignore_ascii_case(email.trim()))
}

async fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, AppError> {
    let access = state.auth.jwt.issue(user.id, user.role)?;

    let refresh_token = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(state.accounts.refresh_ttl_days);
    state
        .db
        .refresh_tokens
        .create(user.id, &hash_refresh_token(&refresh_token), expires_at)
        .await?;

    Ok(TokenPair {
        access_token: access.token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.jwt.access_ttl_secs(),
    })
}

pub async fn register(state: &AppState, request: RegisterRequest) -> Result<AuthResponse, AppError> {
    let email = request.email.trim().to_lowercase();
    if state.db.users.get_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let role = if is_admin_email(state, &email) {
        UserRole::Admin
    } else {
        UserRole::Member
    };
    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .users
        .create(
            &email,
            &password_hash,
            request.display_name.as_deref().map(str::trim),
            role,
            request.preferred_language.unwrap_or(state.default_language),
        )
        .await?;

    let tokens = issue_tokens(state, &user).await?;
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}

pub async fn login(state: &AppState, request: LoginRequest) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .db
        .users
        .get_by_email(&request.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }

    state.db.users.touch_last_login(user.id).await?;
    let tokens = issue_tokens(state, &user).await?;
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}

/// Exchange a refresh token for a new pair. Presenting a token that was already
/// rotated revokes every session of its owner.
pub async fn refresh(
    state: &AppState,
    presented: &str,
    client_ip: Option<String>,
) -> Result<TokenPair, AppError> {
    let next_token = generate_refresh_token();
    let next_expires_at = Utc::now() + Duration::days(state.accounts.refresh_ttl_days);

    let rotation = state
        .db
        .refresh_tokens
        .rotate(
            &hash_refresh_token(presented),
            &hash_refresh_token(&next_token),
            next_expires_at,
        )
        .await?;

    match rotation {
        Rotation::Rotated { previous, .. } => {
            let user = state
                .db
                .users
                .get_by_id(previous.user_id)
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| AppError::Unauthorized("Account is not available".to_string()))?;

            let access = state.auth.jwt.issue(user.id, user.role)?;
            Ok(TokenPair {
                access_token: access.token,
                refresh_token: next_token,
                token_type: "Bearer".to_string(),
                expires_in: state.auth.jwt.access_ttl_secs(),
            })
        }
        Rotation::Reused { user_id } => {
            audit::log_refresh_token_reuse(user_id, client_ip);
            if let Err(e) = revoke_access_tokens(state, user_id).await {
                tracing::error!(error = %e, user_id = %user_id, "Failed to revoke access tokens after refresh token reuse");
            }
            Err(AppError::Unauthorized(
                "Refresh token has been revoked".to_string(),
            ))
        }
        Rotation::Invalid => Err(AppError::Unauthorized("Invalid refresh token".to_string())),
    }
}

/// Blacklist the caller's access token for its remaining lifetime.
pub async fn logout(
    state: &AppState,
    user: &AuthUser,
    request: LogoutRequest,
) -> Result<(), AppError> {
    let remaining = (user.expires_at - Utc::now().timestamp()).max(1) as u64;
    state
        .auth
        .token_store
        .blacklist(&user.token, std::time::Duration::from_secs(remaining))
        .await?;

    if let Some(refresh_token) = request.refresh_token {
        state
            .db
            .refresh_tokens
            .revoke(&hash_refresh_token(&refresh_token))
            .await?;
    }

    audit::AuditLogEntry::new(audit::AuditEventType::Logout)
        .user(Some(user.user_id))
        .log();
    Ok(())
}

async fn revoke_access_tokens(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let ttl = std::time::Duration::from_secs(state.accounts.revocation_ttl_days * 24 * 60 * 60);
    state
        .auth
        .token_store
        .revoke_all(user_id, Utc::now().timestamp_millis(), ttl)
        .await?;
    Ok(())
}

/// Invalidate every access and refresh token of `user_id` issued until now.
pub async fn revoke_all(
    state: &AppState,
    user_id: Uuid,
    actor_id: Uuid,
) -> Result<RevocationResponse, AppError> {
    revoke_access_tokens(state, user_id).await?;
    let refresh_tokens_revoked = state.db.refresh_tokens.revoke_all_for_user(user_id).await?;
    audit::log_tokens_revoked(user_id, actor_id, refresh_tokens_revoked);
    Ok(RevocationResponse {
        user_id,
        refresh_tokens_revoked,
    })
}
