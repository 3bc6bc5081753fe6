use chrono::Utc;
use firmhub_core::models::{User, UserRole};
use firmhub_core::{AppError, Language};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a user; the email is stored lowercased.
    #[tracing::instrument(skip(self, password_hash), fields(db.table = "users", db.operation = "insert"))]
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        role: UserRole,
        preferred_language: Language,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name, role, preferred_language)
            VALUES (LOWER($1), $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .bind(preferred_language)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create user");
            AppError::Database(e)
        })?;

        tracing::info!(user_id = %user.id, role = ?user.role, "User created");

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, email), fields(db.table = "users", db.operation = "select"))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<Postgres, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<Postgres, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
