//! Message handler context trait
//!
//! The API implements this trait for its application state. The worker calls
//! `dispatch` for each claimed message; the implementation matches on the topic and
//! invokes the consumer.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use firmhub_core::messages::MessageContract;
use firmhub_core::models::QueuedMessage;

#[async_trait]
pub trait MessageHandlerContext: Send + Sync {
    /// Handle one message. An error wrapping [`ConsumerError::Unrecoverable`] dead-letters
    /// the message immediately; any other error schedules a retry.
    async fn dispatch(self: Arc<Self>, message: &QueuedMessage) -> Result<()>;
}

/// Failure classification for consumers.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("{0}")]
    Recoverable(anyhow::Error),

    #[error("{0}")]
    Unrecoverable(anyhow::Error),
}

impl ConsumerError {
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        ConsumerError::Recoverable(err.into())
    }

    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        ConsumerError::Unrecoverable(err.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConsumerError::Recoverable(_))
    }

    /// Whether an `anyhow` error returned by a consumer must not be retried.
    pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
        err.downcast_ref::<ConsumerError>()
            .map(|e| !e.is_recoverable())
            .unwrap_or(false)
    }
}

/// Decode the payload of a message for contract `M`. A topic mismatch or malformed
/// payload can never succeed on retry, so both are unrecoverable.
pub fn decode_payload<M: MessageContract>(message: &QueuedMessage) -> Result<M> {
    if message.topic != M::TOPIC {
        return Err(ConsumerError::unrecoverable(anyhow!(
            "Message {} has topic {}, expected {}",
            message.id,
            message.topic,
            M::TOPIC
        ))
        .into());
    }
    serde_json::from_value(message.payload.clone()).map_err(|e| {
        ConsumerError::unrecoverable(anyhow!("Malformed {} payload: {}", M::TOPIC, e)).into()
    })
}

/// Placeholder used before the application state exists. Dispatch always errors.
struct NoopContext;

#[async_trait]
impl MessageHandlerContext for NoopContext {
    async fn dispatch(self: Arc<Self>, _message: &QueuedMessage) -> Result<()> {
        Err(anyhow!("NoopContext: no handler context available"))
    }
}

pub fn empty_context_weak() -> Weak<dyn MessageHandlerContext> {
    let n: Arc<dyn MessageHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use firmhub_core::messages::{EmailMessage, FileUploaded};
    use firmhub_core::models::MessageStatus;
    use uuid::Uuid;

    fn queued(topic: &str, payload: serde_json::Value) -> QueuedMessage {
        QueuedMessage {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            payload,
            status: MessageStatus::Processing,
            attempts: 1,
            max_attempts: 5,
            available_at: Utc::now(),
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_decode_matching_topic() {
        let msg = queued(
            EmailMessage::TOPIC,
            serde_json::json!({"to": "a@b.test", "subject": "s", "body_text": "t", "body_html": null}),
        );
        let email: EmailMessage = decode_payload(&msg).unwrap();
        assert_eq!(email.to, "a@b.test");
    }

    #[test]
    fn test_topic_mismatch_is_unrecoverable() {
        let msg = queued(EmailMessage::TOPIC, serde_json::json!({}));
        let err = decode_payload::<FileUploaded>(&msg).unwrap_err();
        assert!(ConsumerError::is_unrecoverable(&err));
    }

    #[test]
    fn test_malformed_payload_is_unrecoverable() {
        let msg = queued(FileUploaded::TOPIC, serde_json::json!({"media_id": 3}));
        let err = decode_payload::<FileUploaded>(&msg).unwrap_err();
        assert!(ConsumerError::is_unrecoverable(&err));
    }

    #[test]
    fn test_plain_errors_are_retried() {
        let err = anyhow!("smtp timeout");
        assert!(!ConsumerError::is_unrecoverable(&err));
        let err: anyhow::Error = ConsumerError::recoverable(anyhow!("network")).into();
        assert!(!ConsumerError::is_unrecoverable(&err));
    }

    #[tokio::test]
    async fn test_empty_context_is_dropped() {
        assert!(empty_context_weak().upgrade().is_none());
    }
}
