//! Bearer-token authentication
//!
//! Check order for every token: blacklist, signature and expiry, then the per-user
//! revocation timestamp. Any token-store failure rejects the request.

use crate::auth::jwt::JwtService;
use crate::auth::models::AuthUser;
use crate::constants::TRUSTED_PROXY_COUNT;
use crate::error::{too_many_auth_failures, HttpAppError};
use crate::middleware::audit;
use crate::utils::client_ip::client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use firmhub_core::AppError;
use firmhub_services::TokenStore;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Client addresses tracked by the failure limiter before old entries are evicted.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Counts failed authentications per client address inside a fixed window.
#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
    max_clients: usize,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
            max_clients: MAX_TRACKED_CLIENTS,
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.max(1);
        self
    }

    /// Make room for one more client: drop expired windows, then the oldest one.
    fn evict(clients: &mut HashMap<String, (u32, Instant)>, max_clients: usize, now: Instant) {
        if clients.len() < max_clients {
            return;
        }
        clients.retain(|_, (_, reset_at)| *reset_at > now);
        if clients.len() >= max_clients {
            let oldest = clients
                .iter()
                .min_by_key(|(_, (_, reset_at))| *reset_at)
                .map(|(ip, _)| ip.clone());
            if let Some(ip) = oldest {
                clients.remove(&ip);
                tracing::debug!(
                    evicted = %ip,
                    tracked = clients.len(),
                    "Evicted oldest auth failure window due to capacity limit"
                );
            }
        }
    }

    /// Record a failure; returns true once the client has reached the limit.
    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        if !guard.contains_key(ip) {
            Self::evict(&mut guard, self.max_clients, now);
        }
        let (count, reset_at) = guard
            .entry(ip.to_string())
            .or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.get(ip) {
            Some((_, reset_at)) if Instant::now() >= *reset_at => {
                guard.remove(ip);
                false
            }
            Some((count, _)) => *count >= self.max_failures,
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub token_store: Arc<dyn TokenStore>,
    pub failure_limiter: Option<Arc<AuthFailureLimiter>>,
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        )),
    }
}

/// Validate `token` and build the caller identity.
pub async fn authenticate(state: &AuthState, token: &str) -> Result<AuthUser, AppError> {
    // Before the signature: a blacklisted token is refused whatever it carries.
    match state.token_store.is_blacklisted(token).await {
        Ok(false) => {}
        Ok(true) => return Err(AppError::Unauthorized("Token has been revoked".to_string())),
        Err(e) => {
            tracing::warn!(error = %e, "Token store unavailable during blacklist check");
            return Err(AppError::Unauthorized(
                "Unable to verify token status".to_string(),
            ));
        }
    }

    let claims = state.jwt.verify(token)?;

    match state.token_store.revoked_at(claims.sub).await {
        Ok(Some(revoked_at)) if claims.iat_ms < revoked_at => {
            return Err(AppError::Unauthorized("Token has been revoked".to_string()));
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, user_id = %claims.sub, "Token store unavailable during revocation check");
            return Err(AppError::Unauthorized(
                "Unable to verify token status".to_string(),
            ));
        }
    }

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
        token: token.to_string(),
        expires_at: claims.exp,
    })
}

async fn run(state: &AuthState, mut request: Request, next: Next, required: bool) -> Response {
    let socket = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let ip = client_ip(request.headers(), socket.as_ref(), TRUSTED_PROXY_COUNT);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    if let Some(limiter) = &state.failure_limiter {
        if limiter.is_blocked(&ip).await {
            return too_many_auth_failures();
        }
    }

    let outcome = match bearer_token(request.headers()) {
        Ok(Some(token)) => authenticate(state, token).await,
        Ok(None) if !required => return next.run(request).await,
        Ok(None) => Err(AppError::Unauthorized(
            "Missing authorization header".to_string(),
        )),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(user) => {
            audit::log_authentication_attempt(Some(user.user_id), Some(ip), user_agent, None);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            audit::log_authentication_attempt(None, Some(ip.clone()), user_agent, Some(&err.to_string()));
            if let Some(limiter) = &state.failure_limiter {
                if limiter.record_failure(&ip).await {
                    return too_many_auth_failures();
                }
            }
            HttpAppError(err).into_response()
        }
    }
}

/// Require a valid bearer token.
pub async fn auth_middleware(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    run(&state, request, next, true).await
}

/// Authenticate when a token is present; anonymous requests pass through.
/// A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    run(&state, request, next, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use firmhub_core::models::UserRole;
    use firmhub_services::InMemoryTokenStore;
    use uuid::Uuid;

    fn state(store: Arc<InMemoryTokenStore>) -> AuthState {
        AuthState {
            jwt: JwtService::new("a-test-secret-that-is-at-least-32-bytes", "firmhub", 15),
            token_store: store,
            failure_limiter: None,
        }
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let state = state(Arc::new(InMemoryTokenStore::new()));
        let issued = state.jwt.issue(Uuid::new_v4(), UserRole::Member).unwrap();
        let user = authenticate(&state, &issued.token).await.unwrap();
        assert_eq!(user.user_id, issued.claims.sub);
    }

    #[tokio::test]
    async fn test_blacklisted_garbage_is_rejected_as_revoked() {
        let store = Arc::new(InMemoryTokenStore::new());
        store
            .blacklist("not-even-a-jwt", Duration::from_secs(60))
            .await
            .unwrap();
        let err = authenticate(&state(store), "not-even-a-jwt").await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized: Token has been revoked");
    }

    #[tokio::test]
    async fn test_store_outage_fails_secure() {
        let store = Arc::new(InMemoryTokenStore::new());
        let state = state(store.clone());
        let issued = state.jwt.issue(Uuid::new_v4(), UserRole::Member).unwrap();
        store.set_unavailable(true);
        assert!(matches!(
            authenticate(&state, &issued.token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_tokens_issued_before_revocation_are_rejected() {
        let store = Arc::new(InMemoryTokenStore::new());
        let state = state(store.clone());
        let user_id = Uuid::new_v4();
        let issued = state.jwt.issue(user_id, UserRole::Member).unwrap();
        store
            .revoke_all(user_id, issued.claims.iat_ms + 1, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(authenticate(&state, &issued.token).await.is_err());
    }

    #[tokio::test]
    async fn test_token_issued_in_revocation_second_is_rejected() {
        let store = Arc::new(InMemoryTokenStore::new());
        let state = state(store.clone());
        let user_id = Uuid::new_v4();
        let stolen = state.jwt.issue(user_id, UserRole::Member).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let revoked_at = chrono::Utc::now().timestamp_millis();
        store
            .revoke_all(user_id, revoked_at, Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let fresh = state.jwt.issue(user_id, UserRole::Member).unwrap();

        // Often the same whole second as the revocation; milliseconds still order them.
        assert!(stolen.claims.iat <= revoked_at / 1000);
        assert!(authenticate(&state, &stolen.token).await.is_err());
        assert!(authenticate(&state, &fresh.token).await.is_ok());
    }

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).unwrap().is_none());
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc"));
    }

    #[tokio::test]
    async fn test_limiter_blocks_after_limit() {
        let limiter = AuthFailureLimiter::new(2, 60);
        assert!(!limiter.record_failure("1.2.3.4").await);
        assert!(limiter.record_failure("1.2.3.4").await);
        assert!(limiter.is_blocked("1.2.3.4").await);
        assert!(!limiter.is_blocked("5.6.7.8").await);
    }

    #[tokio::test]
    async fn test_limiter_evicts_oldest_client_at_capacity() {
        let limiter = AuthFailureLimiter::new(1, 60).with_max_clients(2);
        limiter.record_failure("10.0.0.1").await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        limiter.record_failure("10.0.0.2").await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        limiter.record_failure("10.0.0.3").await;

        assert_eq!(limiter.inner.lock().await.len(), 2);
        assert!(!limiter.is_blocked("10.0.0.1").await);
        assert!(limiter.is_blocked("10.0.0.2").await);
        assert!(limiter.is_blocked("10.0.0.3").await);
    }

    #[tokio::test]
    async fn test_limiter_drops_expired_windows_first() {
        let limiter = AuthFailureLimiter::new(1, 0).with_max_clients(2);
        limiter.record_failure("10.0.0.1").await;
        limiter.record_failure("10.0.0.2").await;
        limiter.record_failure("10.0.0.3").await;

        let clients = limiter.inner.lock().await;
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key("10.0.0.3"));
    }
}
