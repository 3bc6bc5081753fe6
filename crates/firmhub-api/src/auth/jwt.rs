//! HS256 access tokens.

use crate::auth::models::JwtClaims;
use chrono::{Duration, Utc};
use firmhub_core::models::UserRole;
use firmhub_core::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// Leeway for `exp` checks, absorbing clock drift between nodes.
const EXPIRY_LEEWAY_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: JwtClaims,
}

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, issuer: impl Into<String>, access_ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            access_ttl: Duration::minutes(access_ttl_minutes.max(1)),
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
            exp: (now + self.access_ttl).timestamp(),
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }

    /// Check signature, issuer and expiry. Revocation is checked by the middleware.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = EXPIRY_LEEWAY_SECS;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-test-secret-that-is-at-least-32-bytes";

    #[test]
    fn test_issue_then_verify() {
        let service = JwtService::new(SECRET, "firmhub", 15);
        let user_id = Uuid::new_v4();
        let issued = service.issue(user_id, UserRole::Member).unwrap();

        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Member);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_tokens_issued_together_are_distinct() {
        let service = JwtService::new(SECRET, "firmhub", 15);
        let user_id = Uuid::new_v4();
        let a = service.issue(user_id, UserRole::Member).unwrap();
        let b = service.issue(user_id, UserRole::Member).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtService::new(SECRET, "firmhub", 15);
        let other = JwtService::new("another-secret-that-is-at-least-32-bytes", "firmhub", 15);
        let issued = issuer.issue(Uuid::new_v4(), UserRole::Admin).unwrap();
        assert!(matches!(
            other.verify(&issued.token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let issuer = JwtService::new(SECRET, "someone-else", 15);
        let verifier = JwtService::new(SECRET, "firmhub", 15);
        let issued = issuer.issue(Uuid::new_v4(), UserRole::Member).unwrap();
        assert!(verifier.verify(&issued.token).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let service = JwtService::new(SECRET, "firmhub", 15);
        assert!(service.verify("not-a-jwt").is_err());
    }
}
