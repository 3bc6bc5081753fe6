use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use firmhub_core::messages::MessageContract;
use firmhub_core::models::QueuedMessage;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Channel used with LISTEN/NOTIFY to wake idle workers.
pub const NEW_MESSAGE_CHANNEL: &str = "firmhub_new_message";

/// Longest wait between two delivery attempts.
const MAX_RETRY_DELAY_SECS: i64 = 300;

/// Delay before the next attempt after `attempts` failed deliveries: 2, 4, 8 ... seconds,
/// capped at five minutes.
pub fn next_retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.clamp(1, 16) as u32;
    Duration::seconds(2_i64.pow(exponent).min(MAX_RETRY_DELAY_SECS))
}

/// Postgres-backed message queue.
///
/// Producers insert a row and `pg_notify` in the same transaction; workers claim rows with
/// `FOR UPDATE SKIP LOCKED` so each message is handed to exactly one worker at a time.
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serialize and enqueue a message on its contract topic.
    pub async fn publish<M: MessageContract>(
        &self,
        message: &M,
        max_attempts: i32,
    ) -> Result<QueuedMessage> {
        let payload = serde_json::to_value(message).context("Failed to serialize message")?;
        self.enqueue(M::TOPIC, payload, max_attempts).await
    }

    #[tracing::instrument(skip(self, payload), fields(db.table = "messages", db.operation = "insert"))]
    pub async fn enqueue(
        &self,
        topic: &str,
        payload: serde_json::Value,
        max_attempts: i32,
    ) -> Result<QueuedMessage> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for message enqueue")?;

        let message = sqlx::query_as::<Postgres, QueuedMessage>(
            r#"
            INSERT INTO messages (topic, payload, max_attempts)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(topic)
        .bind(payload)
        .bind(max_attempts.max(1))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, topic = %topic, "Failed to insert message");
            anyhow::anyhow!("Failed to insert message: {}", e)
        })?;

        // Workers still find the row by polling if the notification is lost.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(NEW_MESSAGE_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                message_id = %message.id,
                "Failed to send pg_notify for new message"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit message enqueue")?;

        tracing::info!(message_id = %message.id, topic = %topic, "Message enqueued");

        Ok(message)
    }

    /// Claim the oldest ready message and count the delivery attempt.
    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "claim"))]
    pub async fn claim_next(&self) -> Result<Option<QueuedMessage>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let candidate: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM messages
            WHERE status = 'pending' AND available_at <= NOW()
            ORDER BY available_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch next message")?;

        let Some((id,)) = candidate else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let message = sqlx::query_as::<Postgres, QueuedMessage>(
            r#"
            UPDATE messages
            SET status = 'processing', attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to mark message as processing")?;

        tx.commit().await.context("Failed to commit claim")?;

        tracing::debug!(
            message_id = %message.id,
            topic = %message.topic,
            attempt = message.attempts,
            "Message claimed"
        );

        Ok(Some(message))
    }

    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "update", db.record_id = %id))]
    pub async fn mark_completed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET status = 'completed', last_error = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark message as completed")?;

        Ok(())
    }

    /// Record a failed delivery: reschedule with backoff, or dead-letter the message
    /// once it has used all of its attempts.
    #[tracing::instrument(skip(self, error), fields(db.table = "messages", db.operation = "update", db.record_id = %message.id))]
    pub async fn mark_failed(&self, message: &QueuedMessage, error: &str) -> Result<QueuedMessage> {
        let updated = if message.attempts >= message.max_attempts {
            let updated = sqlx::query_as::<Postgres, QueuedMessage>(
                r#"
                UPDATE messages
                SET status = 'dead', last_error = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(message.id)
            .bind(error)
            .fetch_one(&self.pool)
            .await
            .context("Failed to dead-letter message")?;

            tracing::error!(
                message_id = %message.id,
                topic = %message.topic,
                attempts = message.attempts,
                error = %error,
                "Message moved to dead letter"
            );
            updated
        } else {
            let available_at = Utc::now() + next_retry_delay(message.attempts);
            let updated = sqlx::query_as::<Postgres, QueuedMessage>(
                r#"
                UPDATE messages
                SET status = 'pending', last_error = $2, available_at = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(message.id)
            .bind(error)
            .bind(available_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to reschedule message")?;

            tracing::warn!(
                message_id = %message.id,
                topic = %message.topic,
                attempts = message.attempts,
                retry_at = %available_at,
                error = %error,
                "Message delivery failed, retry scheduled"
            );
            updated
        };

        Ok(updated)
    }

    /// Dead-letter a message immediately, regardless of remaining attempts.
    #[tracing::instrument(skip(self, error), fields(db.table = "messages", db.operation = "update", db.record_id = %id))]
    pub async fn mark_dead(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET status = 'dead', last_error = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to dead-letter message")?;

        Ok(())
    }

    /// Return messages stuck in `processing` (worker crashed mid-delivery) to the queue.
    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "update"))]
    pub async fn requeue_stale(&self, older_than_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'pending', available_at = NOW(), updated_at = NOW()
            WHERE status = 'processing' AND updated_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than_secs as f64)
        .execute(&self.pool)
        .await
        .context("Failed to requeue stale messages")?;

        if result.rows_affected() > 0 {
            tracing::warn!(count = result.rows_affected(), "Requeued stale messages");
        }

        Ok(result.rows_affected())
    }

    /// Delete completed messages older than `older_than_days`.
    #[tracing::instrument(skip(self), fields(db.table = "messages", db.operation = "delete"))]
    pub async fn delete_completed(&self, older_than_days: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE status = 'completed' AND updated_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await
        .context("Failed to delete completed messages")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_retry_delay_doubles() {
        assert_eq!(next_retry_delay(1).num_seconds(), 2);
        assert_eq!(next_retry_delay(2).num_seconds(), 4);
        assert_eq!(next_retry_delay(5).num_seconds(), 32);
    }

    #[test]
    fn test_next_retry_delay_is_capped() {
        assert_eq!(next_retry_delay(9).num_seconds(), 300);
        assert_eq!(next_retry_delay(40).num_seconds(), 300);
    }

    #[test]
    fn test_next_retry_delay_handles_zero_attempts() {
        assert_eq!(next_retry_delay(0).num_seconds(), 2);
    }
}
