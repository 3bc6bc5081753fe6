use chrono::{DateTime, Utc};
use firmhub_core::models::RefreshToken;
use firmhub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::transaction::TransactionGuard;

/// Outcome of presenting a refresh token for rotation.
#[derive(Debug)]
pub enum Rotation {
    /// The token was active; it is now revoked and replaced by the returned row.
    Rotated { previous: RefreshToken, next: RefreshToken },
    /// The token was already rotated. Every token of the user has been revoked.
    Reused { user_id: Uuid },
    /// Unknown, expired, or revoked without a replacement (logout, revoke-all).
    Invalid,
}

/// Stores refresh tokens by SHA-256 hash only.
#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, token_hash), fields(db.table = "refresh_tokens", db.operation = "insert"))]
    pub async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<Postgres, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    /// Swap the presented token for a new one in a single transaction.
    ///
    /// The presented row is locked so two concurrent refreshes cannot both succeed.
    #[tracing::instrument(skip_all, fields(db.table = "refresh_tokens", db.operation = "update"))]
    pub async fn rotate(
        &self,
        presented_hash: &str,
        next_hash: &str,
        next_expires_at: DateTime<Utc>,
    ) -> Result<Rotation, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let current = sqlx::query_as::<Postgres, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(presented_hash)
        .fetch_optional(tx.conn()?)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(Rotation::Invalid);
        };

        let now = Utc::now();
        if current.revoked_at.is_some() && current.replaced_by.is_none() {
            tx.rollback().await?;
            return Ok(Rotation::Invalid);
        }
        if current.revoked_at.is_some() {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(current.user_id)
            .bind(now)
            .execute(tx.conn()?)
            .await?;
            tx.commit().await?;

            tracing::warn!(user_id = %current.user_id, "Refresh token reuse detected");
            return Ok(Rotation::Reused {
                user_id: current.user_id,
            });
        }

        if !current.is_active(now) {
            tx.rollback().await?;
            return Ok(Rotation::Invalid);
        }

        let next = sqlx::query_as::<Postgres, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(current.user_id)
        .bind(next_hash)
        .bind(next_expires_at)
        .fetch_one(tx.conn()?)
        .await?;

        let previous = sqlx::query_as::<Postgres, RefreshToken>(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2, replaced_by = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(now)
        .bind(next.id)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;

        Ok(Rotation::Rotated { previous, next })
    }

    /// Revoke one token by hash. Returns false when nothing active matched.
    #[tracing::instrument(skip_all, fields(db.table = "refresh_tokens", db.operation = "update"))]
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "refresh_tokens", db.operation = "update"))]
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            revoked = result.rows_affected(),
            "Refresh tokens revoked"
        );

        Ok(result.rows_affected())
    }
}
