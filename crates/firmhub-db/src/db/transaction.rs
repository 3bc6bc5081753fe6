//! Database transaction utilities
//!
//! Multi-step writes (answer batches, question definitions, refresh rotation, queue
//! claims) run inside a [`TransactionGuard`] so they either land together or not at all.

use firmhub_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// A transaction wrapper with explicit commit and rollback.
///
/// # Example
///
/// ```ignore
/// use firmhub_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), firmhub_core::AppError> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("DELETE FROM answers WHERE firm_id = $1")
///         .bind(uuid::Uuid::nil())
///         .execute(tx.conn()?)
///         .await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Connection bound to the open transaction.
    pub fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        self.transaction
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already finished".to_string()))
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit database transaction");
                AppError::Database(e)
            })?;
        }
        Ok(())
    }

    /// Roll the transaction back
    pub async fn rollback(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await.map_err(AppError::Database)?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        // sqlx queues the rollback when the inner transaction drops.
        if self.transaction.is_some() {
            tracing::warn!("Transaction dropped without commit or rollback, rolling back");
        }
    }
}
