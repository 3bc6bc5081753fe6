use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use firmhub_core::models::UserRole;
use firmhub_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub role: UserRole,
    pub iat: i64,
    /// Issue time in unix milliseconds, compared with revoke-all markers.
    pub iat_ms: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub iss: String,
}

/// Authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    /// Raw bearer token, kept for logout.
    pub token: String,
    pub expires_at: i64,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// Read straight from the parts so the extractor works next to Multipart.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Authentication required".to_string(),
            ))
        })
    }
}

/// An [`AuthUser`] with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(HttpAppError(AppError::Forbidden(
                "Administrator role required".to_string(),
            )));
        }
        Ok(AdminUser(user))
    }
}

/// Caller on a public route that may or may not carry a token.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}
