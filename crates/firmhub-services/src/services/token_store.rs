//! Access-token blacklist and per-user revocation markers.
//!
//! Two kinds of keys are kept:
//! - `blacklist:{token}` for a single logged-out access token, expiring with the token;
//! - `revoked:{user_id}` holding the unix time in milliseconds of a revoke-all, so every
//!   token issued before it is rejected.

use async_trait::async_trait;
use firmhub_core::constants::{BLACKLIST_KEY_PREFIX, REVOKED_KEY_PREFIX};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Token store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt token store value for {key}: {value}")]
    CorruptValue { key: String, value: String },
}

impl From<TokenStoreError> for firmhub_core::AppError {
    fn from(err: TokenStoreError) -> Self {
        firmhub_core::AppError::Cache(err.to_string())
    }
}

pub fn blacklist_key(token: &str) -> String {
    format!("{}{}", BLACKLIST_KEY_PREFIX, token)
}

pub fn revoked_key(user_id: Uuid) -> String {
    format!("{}{}", REVOKED_KEY_PREFIX, user_id)
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Blacklist an access token for `ttl`, normally its remaining lifetime.
    async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), TokenStoreError>;

    async fn is_blacklisted(&self, token: &str) -> Result<bool, TokenStoreError>;

    /// Record that every token of `user_id` issued before `revoked_at` (unix milliseconds)
    /// is invalid.
    async fn revoke_all(
        &self,
        user_id: Uuid,
        revoked_at: i64,
        ttl: Duration,
    ) -> Result<(), TokenStoreError>;

    /// Unix time in milliseconds of the latest revoke-all for the user, if still recorded.
    async fn revoked_at(&self, user_id: Uuid) -> Result<Option<i64>, TokenStoreError>;

    async fn ping(&self) -> Result<(), TokenStoreError>;
}

#[cfg(feature = "redis")]
pub use redis_store::RedisTokenStore;

#[cfg(feature = "redis")]
mod redis_store {
    use super::*;
    use redis::{aio::ConnectionManager, AsyncCommands, Client};

    /// Redis-backed store. `ConnectionManager` reconnects on its own; callers decide what
    /// an error means.
    #[derive(Clone)]
    pub struct RedisTokenStore {
        manager: ConnectionManager,
    }

    impl RedisTokenStore {
        pub async fn connect(url: &str) -> Result<Self, TokenStoreError> {
            let client =
                Client::open(url).map_err(|e| TokenStoreError::Unavailable(e.to_string()))?;
            let manager = ConnectionManager::new(client)
                .await
                .map_err(|e| TokenStoreError::Unavailable(e.to_string()))?;

            tracing::info!("Connected to Redis token store");

            Ok(Self { manager })
        }
    }

    fn unavailable(op: &str, e: redis::RedisError) -> TokenStoreError {
        TokenStoreError::Unavailable(format!("Redis {} failed: {}", op, e))
    }

    #[async_trait]
    impl TokenStore for RedisTokenStore {
        async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), TokenStoreError> {
            let mut conn = self.manager.clone();
            conn.set_ex::<_, _, ()>(blacklist_key(token), 1_u8, ttl.as_secs().max(1))
                .await
                .map_err(|e| unavailable("SETEX", e))
        }

        async fn is_blacklisted(&self, token: &str) -> Result<bool, TokenStoreError> {
            let mut conn = self.manager.clone();
            conn.exists::<_, bool>(blacklist_key(token))
                .await
                .map_err(|e| unavailable("EXISTS", e))
        }

        async fn revoke_all(
            &self,
            user_id: Uuid,
            revoked_at: i64,
            ttl: Duration,
        ) -> Result<(), TokenStoreError> {
            let mut conn = self.manager.clone();
            conn.set_ex::<_, _, ()>(revoked_key(user_id), revoked_at, ttl.as_secs().max(1))
                .await
                .map_err(|e| unavailable("SETEX", e))
        }

        async fn revoked_at(&self, user_id: Uuid) -> Result<Option<i64>, TokenStoreError> {
            let mut conn = self.manager.clone();
            let key = revoked_key(user_id);
            let raw: Option<String> = conn.get(&key).await.map_err(|e| unavailable("GET", e))?;
            match raw {
                None => Ok(None),
                Some(value) => value
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| TokenStoreError::CorruptValue { key, value }),
            }
        }

        async fn ping(&self) -> Result<(), TokenStoreError> {
            let mut conn = self.manager.clone();
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| unavailable("PING", e))
        }
    }
}

/// Entry count at which the in-memory store first sweeps expired keys.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Default)]
struct Entries {
    values: HashMap<String, (i64, Instant)>,
    sweep_at: usize,
}

impl Entries {
    /// Drop expired keys once the map reaches `sweep_at`; the next sweep waits for twice
    /// the surviving size.
    fn sweep(&mut self, threshold: usize, now: Instant) {
        if self.values.len() < self.sweep_at.max(threshold) {
            return;
        }
        let before = self.values.len();
        self.values.retain(|_, (_, expires)| *expires > now);
        self.sweep_at = (self.values.len() * 2).max(threshold);
        tracing::debug!(
            removed = before - self.values.len(),
            remaining = self.values.len(),
            "Swept expired token store entries"
        );
    }
}

/// Process-local store with the same expiry semantics, for tests and single-node setups.
pub struct InMemoryTokenStore {
    entries: RwLock<Entries>,
    unavailable: std::sync::atomic::AtomicBool,
    sweep_threshold: usize,
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self {
            entries: RwLock::default(),
            unavailable: std::sync::atomic::AtomicBool::new(false),
            sweep_threshold: SWEEP_THRESHOLD,
        }
    }
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self
    }

    /// Make every call fail, to exercise fail-secure paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), TokenStoreError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TokenStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn put(&self, key: String, value: i64, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.sweep(self.sweep_threshold, now);
        entries.values.insert(key, (value, now + ttl));
    }

    async fn get(&self, key: &str) -> Option<i64> {
        let entries = self.entries.read().await;
        entries
            .values
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| *value)
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), TokenStoreError> {
        self.check()?;
        self.put(blacklist_key(token), 1, ttl).await;
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, TokenStoreError> {
        self.check()?;
        Ok(self.get(&blacklist_key(token)).await.is_some())
    }

    async fn revoke_all(
        &self,
        user_id: Uuid,
        revoked_at: i64,
        ttl: Duration,
    ) -> Result<(), TokenStoreError> {
        self.check()?;
        self.put(revoked_key(user_id), revoked_at, ttl).await;
        Ok(())
    }

    async fn revoked_at(&self, user_id: Uuid) -> Result<Option<i64>, TokenStoreError> {
        self.check()?;
        Ok(self.get(&revoked_key(user_id)).await)
    }

    async fn ping(&self) -> Result<(), TokenStoreError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let user = Uuid::nil();
        assert_eq!(blacklist_key("abc"), "blacklist:abc");
        assert_eq!(
            revoked_key(user),
            "revoked:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn test_blacklist_roundtrip() {
        let store = InMemoryTokenStore::new();
        assert!(!store.is_blacklisted("t1").await.unwrap());
        store.blacklist("t1", Duration::from_secs(60)).await.unwrap();
        assert!(store.is_blacklisted("t1").await.unwrap());
        assert!(!store.is_blacklisted("t2").await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = InMemoryTokenStore::new();
        store.blacklist("t1", Duration::ZERO).await.unwrap();
        assert!(!store.is_blacklisted("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept() {
        let store = InMemoryTokenStore::new().with_sweep_threshold(4);
        for token in ["t1", "t2", "t3", "t4"] {
            store.blacklist(token, Duration::ZERO).await.unwrap();
        }
        store.blacklist("live", Duration::from_secs(60)).await.unwrap();

        let entries = store.entries.read().await;
        assert_eq!(entries.values.len(), 1);
        assert!(entries.values.contains_key(&blacklist_key("live")));
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let store = InMemoryTokenStore::new().with_sweep_threshold(2);
        for token in ["t1", "t2", "t3", "t4", "t5"] {
            store.blacklist(token, Duration::from_secs(60)).await.unwrap();
        }
        for token in ["t1", "t2", "t3", "t4", "t5"] {
            assert!(store.is_blacklisted(token).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_revoke_all_records_timestamp() {
        let store = InMemoryTokenStore::new();
        let user = Uuid::new_v4();
        assert_eq!(store.revoked_at(user).await.unwrap(), None);
        store
            .revoke_all(user, 1_700_000_000_123, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.revoked_at(user).await.unwrap(), Some(1_700_000_000_123));
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryTokenStore::new();
        store.set_unavailable(true);
        assert!(store.is_blacklisted("t1").await.is_err());
        assert!(store.revoked_at(Uuid::new_v4()).await.is_err());
        assert!(store.ping().await.is_err());
    }
}
