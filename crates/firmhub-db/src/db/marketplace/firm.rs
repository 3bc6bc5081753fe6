use chrono::Utc;
use firmhub_core::models::{
    Firm, FirmContact, FirmDetails, FirmLinks, FirmLocation, FirmStatus, UpdateFirmRequest,
};
use firmhub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::transaction::TransactionGuard;

/// Firms and their profile sub-records.
#[derive(Clone)]
pub struct FirmRepository {
    pool: PgPool,
}

impl FirmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "insert"))]
    pub async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Firm, AppError> {
        let firm = sqlx::query_as::<Postgres, Firm>(
            r#"
            INSERT INTO firms (owner_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create firm");
            AppError::Database(e)
        })?;

        tracing::info!(firm_id = %firm.id, owner_id = %owner_id, "Firm created");

        Ok(firm)
    }

    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Firm>, AppError> {
        let firm = sqlx::query_as::<Postgres, Firm>("SELECT * FROM firms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(firm)
    }

    /// A firm with contact, links, location and selected services.
    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "select", db.record_id = %id))]
    pub async fn get_details(&self, id: Uuid) -> Result<Option<FirmDetails>, AppError> {
        let Some(firm) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let contact = sqlx::query_as::<Postgres, FirmContact>(
            "SELECT email, phone, contact_name FROM firm_contacts WHERE firm_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();

        let links = sqlx::query_as::<Postgres, FirmLinks>(
            "SELECT website, linkedin, twitter FROM firm_links WHERE firm_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();

        let location = sqlx::query_as::<Postgres, FirmLocation>(
            r#"
            SELECT address_line, city, postal_code, country, latitude, longitude
            FROM firm_locations WHERE firm_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();

        let service_ids = self.service_ids(id).await?;

        Ok(Some(FirmDetails {
            firm,
            contact,
            links,
            location,
            service_ids,
        }))
    }

    /// Firms visible to the public, or filtered by status for moderators.
    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "select"))]
    pub async fn list_by_status(
        &self,
        statuses: &[FirmStatus],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Firm>, AppError> {
        let firms = sqlx::query_as::<Postgres, Firm>(
            r#"
            SELECT * FROM firms
            WHERE status = ANY($1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(statuses)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(firms)
    }

    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "select"))]
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Firm>, AppError> {
        let firms = sqlx::query_as::<Postgres, Firm>(
            "SELECT * FROM firms WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(firms)
    }

    /// Write the profile and move the firm from `from` to `to` in one transaction.
    ///
    /// Returns `None` without writing anything when the firm is no longer in `from`.
    #[tracing::instrument(skip(self, request), fields(db.table = "firms", db.operation = "update", db.record_id = %id))]
    pub async fn update_profile(
        &self,
        id: Uuid,
        request: &UpdateFirmRequest,
        from: FirmStatus,
        to: FirmStatus,
    ) -> Result<Option<Firm>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let firm = sqlx::query_as::<Postgres, Firm>(
            r#"
            UPDATE firms
            SET name = $2, description = $3, status = $4, updated_at = NOW()
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(to)
        .bind(from)
        .fetch_optional(tx.conn()?)
        .await?;
        let Some(firm) = firm else {
            tx.rollback().await?;
            return Ok(None);
        };

        let contact = &request.contact;
        sqlx::query(
            r#"
            INSERT INTO firm_contacts (firm_id, email, phone, contact_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (firm_id) DO UPDATE
            SET email = EXCLUDED.email, phone = EXCLUDED.phone, contact_name = EXCLUDED.contact_name
            "#,
        )
        .bind(id)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.contact_name)
        .execute(tx.conn()?)
        .await?;

        let links = &request.links;
        sqlx::query(
            r#"
            INSERT INTO firm_links (firm_id, website, linkedin, twitter)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (firm_id) DO UPDATE
            SET website = EXCLUDED.website, linkedin = EXCLUDED.linkedin, twitter = EXCLUDED.twitter
            "#,
        )
        .bind(id)
        .bind(&links.website)
        .bind(&links.linkedin)
        .bind(&links.twitter)
        .execute(tx.conn()?)
        .await?;

        let location = &request.location;
        sqlx::query(
            r#"
            INSERT INTO firm_locations
                (firm_id, address_line, city, postal_code, country, latitude, longitude)
            VALUES ($1, $2, $3, $4, UPPER($5), $6, $7)
            ON CONFLICT (firm_id) DO UPDATE
            SET address_line = EXCLUDED.address_line, city = EXCLUDED.city,
                postal_code = EXCLUDED.postal_code, country = EXCLUDED.country,
                latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude
            "#,
        )
        .bind(id)
        .bind(&location.address_line)
        .bind(&location.city)
        .bind(&location.postal_code)
        .bind(&location.country)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;

        Ok(Some(firm))
    }

    #[tracing::instrument(skip(self), fields(db.table = "firm_services", db.operation = "select"))]
    pub async fn service_ids(&self, firm_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT service_id FROM firm_services WHERE firm_id = $1 ORDER BY service_id",
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    #[tracing::instrument(skip(self, service_ids), fields(db.table = "firm_services", db.operation = "replace"))]
    pub async fn replace_services(&self, firm_id: Uuid, service_ids: &[Uuid]) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        sqlx::query("DELETE FROM firm_services WHERE firm_id = $1")
            .bind(firm_id)
            .execute(tx.conn()?)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO firm_services (firm_id, service_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(firm_id)
        .bind(service_ids)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await
    }

    /// Move a firm from `expected` to `next`.
    ///
    /// The `WHERE status = expected` guard makes concurrent transitions lose cleanly:
    /// `None` means another request changed the firm first.
    #[tracing::instrument(skip(self), fields(db.table = "firms", db.operation = "update", db.record_id = %id))]
    pub async fn transition(
        &self,
        id: Uuid,
        expected: FirmStatus,
        next: FirmStatus,
        reviewer: Option<Uuid>,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Firm>, AppError> {
        let now = Utc::now();
        let submitted_at = (next == FirmStatus::AwaitingReview).then_some(now);
        let reviewed_at = reviewer.map(|_| now);

        let firm = sqlx::query_as::<Postgres, Firm>(
            r#"
            UPDATE firms
            SET status = $3,
                rejection_reason = $4,
                submitted_at = COALESCE($5, submitted_at),
                reviewed_at = COALESCE($6, reviewed_at),
                reviewed_by = COALESCE($7, reviewed_by),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(rejection_reason)
        .bind(submitted_at)
        .bind(reviewed_at)
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(firm) = &firm {
            tracing::info!(
                firm_id = %firm.id,
                from = %expected,
                to = %next,
                "Firm status changed"
            );
        }

        Ok(firm)
    }
}
