use firmhub_core::models::{Category, Cluster, Service, TaxonomyTranslation};
use firmhub_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Clusters, categories and services. Translations live in a JSONB column per node.
#[derive(Clone)]
pub struct TaxonomyRepository {
    pool: PgPool,
}

impl TaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "clusters", db.operation = "select"))]
    pub async fn list_clusters(&self) -> Result<Vec<Cluster>, AppError> {
        let clusters = sqlx::query_as::<Postgres, Cluster>(
            "SELECT * FROM clusters ORDER BY position, slug",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(clusters)
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "clusters", db.operation = "insert"))]
    pub async fn create_cluster(
        &self,
        slug: &str,
        position: i32,
        translations: &[TaxonomyTranslation],
    ) -> Result<Cluster, AppError> {
        let cluster = sqlx::query_as::<Postgres, Cluster>(
            r#"
            INSERT INTO clusters (slug, position, translations)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(slug)
        .bind(position)
        .bind(Json(translations))
        .fetch_one(&self.pool)
        .await?;

        Ok(cluster)
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "clusters", db.operation = "update", db.record_id = %id))]
    pub async fn update_cluster(
        &self,
        id: Uuid,
        slug: &str,
        position: i32,
        translations: &[TaxonomyTranslation],
    ) -> Result<Option<Cluster>, AppError> {
        let cluster = sqlx::query_as::<Postgres, Cluster>(
            r#"
            UPDATE clusters
            SET slug = $2, position = $3, translations = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(slug)
        .bind(position)
        .bind(Json(translations))
        .fetch_optional(&self.pool)
        .await?;

        Ok(cluster)
    }

    #[tracing::instrument(skip(self), fields(db.table = "clusters", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_cluster(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select"))]
    pub async fn list_categories(&self, cluster_id: Option<Uuid>) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<Postgres, Category>(
            r#"
            SELECT * FROM categories
            WHERE ($1::uuid IS NULL OR cluster_id = $1)
            ORDER BY cluster_id, position, slug
            "#,
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select", db.record_id = %id))]
    pub async fn get_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<Postgres, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "categories", db.operation = "insert"))]
    pub async fn create_category(
        &self,
        cluster_id: Uuid,
        slug: &str,
        position: i32,
        translations: &[TaxonomyTranslation],
    ) -> Result<Category, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            r#"
            INSERT INTO categories (cluster_id, slug, position, translations)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(cluster_id)
        .bind(slug)
        .bind(position)
        .bind(Json(translations))
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "categories", db.operation = "update", db.record_id = %id))]
    pub async fn update_category(
        &self,
        id: Uuid,
        cluster_id: Uuid,
        slug: &str,
        position: i32,
        translations: &[TaxonomyTranslation],
    ) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            r#"
            UPDATE categories
            SET cluster_id = $2, slug = $3, position = $4, translations = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .bind(slug)
        .bind(position)
        .bind(Json(translations))
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_category(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "services", db.operation = "select"))]
    pub async fn list_services(&self, category_id: Option<Uuid>) -> Result<Vec<Service>, AppError> {
        let services = sqlx::query_as::<Postgres, Service>(
            r#"
            SELECT * FROM services
            WHERE ($1::uuid IS NULL OR category_id = $1)
            ORDER BY category_id, slug
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    /// Ids among `ids` that exist, used to validate a firm's service selection.
    #[tracing::instrument(skip(self, ids), fields(db.table = "services", db.operation = "select"))]
    pub async fn existing_service_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM services WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(found.into_iter().map(|(id,)| id).collect())
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "services", db.operation = "insert"))]
    pub async fn create_service(
        &self,
        category_id: Uuid,
        slug: &str,
        translations: &[TaxonomyTranslation],
    ) -> Result<Service, AppError> {
        let service = sqlx::query_as::<Postgres, Service>(
            r#"
            INSERT INTO services (category_id, slug, translations)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(category_id)
        .bind(slug)
        .bind(Json(translations))
        .fetch_one(&self.pool)
        .await?;

        Ok(service)
    }

    #[tracing::instrument(skip(self, translations), fields(db.table = "services", db.operation = "update", db.record_id = %id))]
    pub async fn update_service(
        &self,
        id: Uuid,
        category_id: Uuid,
        slug: &str,
        translations: &[TaxonomyTranslation],
    ) -> Result<Option<Service>, AppError> {
        let service = sqlx::query_as::<Postgres, Service>(
            r#"
            UPDATE services
            SET category_id = $2, slug = $3, translations = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(category_id)
        .bind(slug)
        .bind(Json(translations))
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    #[tracing::instrument(skip(self), fields(db.table = "services", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_service(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
