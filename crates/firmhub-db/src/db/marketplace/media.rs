use firmhub_core::models::{Media, MediaStatus};
use firmhub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Uploaded firm media and its scan status.
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

/// Row values for a freshly uploaded file.
#[derive(Debug, Clone)]
pub struct NewMedia<'a> {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub uploaded_by: Uuid,
    pub original_filename: &'a str,
    pub content_type: &'a str,
    pub file_size: i64,
    pub temp_key: &'a str,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a row in `scanning` state.
    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "insert", db.record_id = %media.id))]
    pub async fn create(&self, media: NewMedia<'_>) -> Result<Media, AppError> {
        let row = sqlx::query_as::<Postgres, Media>(
            r#"
            INSERT INTO media (
                id, firm_id, uploaded_by, original_filename, content_type, file_size, temp_key, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'scanning')
            RETURNING *
            "#,
        )
        .bind(media.id)
        .bind(media.firm_id)
        .bind(media.uploaded_by)
        .bind(media.original_filename)
        .bind(media.content_type)
        .bind(media.file_size)
        .bind(media.temp_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create media row");
            AppError::Database(e)
        })?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>("SELECT * FROM media WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(media)
    }

    /// Media of a firm; `only_available` hides files that are still being scanned.
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn list_by_firm(
        &self,
        firm_id: Uuid,
        only_available: bool,
    ) -> Result<Vec<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(
            r#"
            SELECT * FROM media
            WHERE firm_id = $1 AND (NOT $2 OR status = 'available')
            ORDER BY created_at DESC
            "#,
        )
        .bind(firm_id)
        .bind(only_available)
        .fetch_all(&self.pool)
        .await?;

        Ok(media)
    }

    /// Promote a scanned file. Only rows still in `scanning` are updated so a
    /// redelivered message cannot flip a deleted or infected row.
    #[tracing::instrument(skip(self, storage_key), fields(db.table = "media", db.operation = "update", db.record_id = %id))]
    pub async fn mark_available(
        &self,
        id: Uuid,
        storage_key: &str,
    ) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(
            r#"
            UPDATE media
            SET status = $2, storage_key = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'scanning'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(MediaStatus::Available)
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>("DELETE FROM media WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(media)
    }
}
