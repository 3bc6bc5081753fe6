//! Worker pool over the `messages` table: LISTEN/NOTIFY wake-ups plus polling, bounded
//! concurrency, retry with backoff and dead-lettering.
//!
//! [`MessageQueue::shutdown`] stops claiming; in-flight consumers run to completion or
//! until their timeout.

use anyhow::{Context, Result};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use firmhub_core::messages::MessageContract;
use firmhub_core::models::QueuedMessage;
use firmhub_db::{MessageRepository, NEW_MESSAGE_CHANNEL};

use crate::context::{ConsumerError, MessageHandlerContext};

#[derive(Clone)]
pub struct MessageQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub max_attempts: i32,
    pub handler_timeout_secs: u64,
    /// Interval between runs of the stale message reaper.
    pub reap_interval_secs: u64,
    /// Messages in `processing` for longer than this are handed out again.
    pub stale_after_secs: i64,
    /// Completed messages are purged after this many days.
    pub retention_days: i32,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            max_attempts: 5,
            handler_timeout_secs: 120,
            reap_interval_secs: 60,
            stale_after_secs: 600,
            retention_days: 7,
        }
    }
}

impl MessageQueueConfig {
    pub fn from_config(config: &firmhub_core::Config) -> Self {
        Self {
            max_workers: config.worker_max_concurrency(),
            poll_interval_ms: config.worker_poll_interval_ms(),
            max_attempts: config.worker_max_attempts(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct MessageQueue {
    repository: MessageRepository,
    config: MessageQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl MessageQueue {
    /// Spawn the worker pool. With `pool`, idle workers also wake on NOTIFY.
    pub fn start(
        repository: MessageRepository,
        config: MessageQueueConfig,
        context: Weak<dyn MessageHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let repo_clone = repository.clone();
        let config_clone = config.clone();
        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    /// Queue handle without workers. Published messages are picked up by the real pool.
    pub fn publisher_only(repository: MessageRepository, config: MessageQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    #[tracing::instrument(skip(self, message), fields(topic = M::TOPIC))]
    pub async fn publish<M: MessageContract>(&self, message: &M) -> Result<QueuedMessage> {
        let queued = self
            .repository
            .publish(message, self.config.max_attempts)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, topic = M::TOPIC, "Failed to publish message");
                e
            })?;
        tracing::info!(message_id = %queued.id, topic = M::TOPIC, "Message published");
        Ok(queued)
    }

    async fn worker_pool(
        repository: MessageRepository,
        config: MessageQueueConfig,
        context: Weak<dyn MessageHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = pool.is_some(),
            "Message worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let handler_timeout = Duration::from_secs(config.handler_timeout_secs);

        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(NEW_MESSAGE_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                if tx.send(()).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.reap_interval_secs > 0 {
            let repo_for_reaper = repository.clone();
            let reap_interval = Duration::from_secs(config.reap_interval_secs);
            let stale_after = config.stale_after_secs;
            let retention_days = config.retention_days;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = repo_for_reaper.requeue_stale(stale_after).await {
                                tracing::error!(error = %e, "Stale message reaper failed");
                            }
                            if let Err(e) = repo_for_reaper.delete_completed(retention_days).await {
                                tracing::error!(error = %e, "Completed message purge failed");
                            }
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Message worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = notify_rx.recv() => {
                    Self::drain(&repository, &semaphore, &context, handler_timeout).await;
                }
                _ = sleep(poll_interval) => {
                    Self::drain(&repository, &semaphore, &context, handler_timeout).await;
                }
            }
        }

        tracing::info!("Message worker pool stopped");
    }

    /// Claim messages until the queue is empty or every worker slot is busy.
    async fn drain(
        repository: &MessageRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn MessageHandlerContext>,
        handler_timeout: Duration,
    ) {
        loop {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::debug!("No workers available, skipping claim");
                    return;
                }
            };

            match repository.claim_next().await {
                Ok(Some(message)) => {
                    let repo = repository.clone();
                    let ctx = context.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) =
                            Self::process_message(message, repo, ctx, handler_timeout).await
                        {
                            tracing::error!(error = %e, "Failed to record message outcome");
                        }
                    });
                }
                Ok(None) => {
                    tracing::trace!("No messages available in queue");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim message");
                    return;
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(message_id = %message.id, topic = %message.topic, attempt = message.attempts))]
    async fn process_message(
        message: QueuedMessage,
        repository: MessageRepository,
        context: Weak<dyn MessageHandlerContext>,
        handler_timeout: Duration,
    ) -> Result<()> {
        let Some(ctx) = context.upgrade() else {
            // Application state is gone (shutdown); let the reaper hand it out again.
            tracing::warn!("Handler context dropped, leaving message for requeue");
            return Ok(());
        };

        match tokio::time::timeout(handler_timeout, ctx.dispatch(&message)).await {
            Ok(Ok(())) => {
                repository
                    .mark_completed(message.id)
                    .await
                    .context("Failed to mark message completed")?;
                tracing::info!("Message processed");
            }
            Ok(Err(e)) if ConsumerError::is_unrecoverable(&e) => {
                tracing::error!(error = %e, "Message failed permanently");
                repository
                    .mark_dead(message.id, &e.to_string())
                    .await
                    .context("Failed to dead-letter message")?;
            }
            Ok(Err(e)) => {
                repository
                    .mark_failed(&message, &e.to_string())
                    .await
                    .context("Failed to record message failure")?;
            }
            Err(_) => {
                let error = format!(
                    "Handler timed out after {}s",
                    handler_timeout.as_secs()
                );
                repository
                    .mark_failed(&message, &error)
                    .await
                    .context("Failed to record message timeout")?;
            }
        }
        Ok(())
    }

    /// Stop claiming new messages. Returns without waiting for in-flight handlers.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating message queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_bounded() {
        let config = MessageQueueConfig::default();
        assert!(config.max_workers > 0);
        assert!(config.stale_after_secs as u64 > config.handler_timeout_secs);
    }
}
