//! Queue consumers. The workers started by [`firmhub_worker::MessageQueue::start`] call
//! back into [`AppState`] through [`MessageHandlerContext`].

pub mod email;
pub mod file_scan;

use crate::state::AppState;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use firmhub_core::messages::{EmailMessage, FileUploaded, MessageContract};
use firmhub_core::models::QueuedMessage;
use firmhub_worker::{decode_payload, ConsumerError, MessageHandlerContext};
use std::sync::Arc;

/// Topics with a registered consumer.
pub const TOPICS: [&str; 2] = [EmailMessage::TOPIC, FileUploaded::TOPIC];

#[async_trait]
impl MessageHandlerContext for AppState {
    async fn dispatch(self: Arc<Self>, message: &QueuedMessage) -> Result<()> {
        match message.topic.as_str() {
            topic if topic == EmailMessage::TOPIC => {
                let email: EmailMessage = decode_payload(message)?;
                self.messaging.email.send(&email).await?;
            }
            topic if topic == FileUploaded::TOPIC => {
                let event: FileUploaded = decode_payload(message)?;
                file_scan::process(&self, &event).await?;
            }
            other => {
                return Err(ConsumerError::unrecoverable(anyhow!(
                    "No consumer for topic {}",
                    other
                ))
                .into());
            }
        }
        Ok(())
    }
}
