//! Per-user push notifications
//!
//! Each connected user gets a broadcast channel; every open SSE stream of that user
//! subscribes to it. Channels are created on first subscribe and dropped once the last
//! receiver is gone.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use firmhub_core::constants::NOTIFICATION_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    /// Event name, e.g. `media.available`.
    pub event: String,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<Notification>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<Notification> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver to every open stream of `user_id`. Returns the number of receivers;
    /// zero when the user is not connected (the notification is dropped).
    pub fn notify(&self, user_id: Uuid, notification: Notification) -> usize {
        let sender = {
            let channels = self
                .channels
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            channels.get(&user_id).cloned()
        };

        let Some(sender) = sender else {
            tracing::debug!(user_id = %user_id, event = %notification.event, "No open stream for notification");
            return 0;
        };

        match sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.prune(user_id);
                0
            }
        }
    }

    /// Drop the channel of `user_id` if nobody listens any more.
    pub fn prune(&self, user_id: Uuid) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if channels
            .get(&user_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&user_id);
        }
    }

    pub fn connected_users(&self) -> usize {
        self.channels
            .read()
            .map(|c| c.len())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_notification_reaches_only_its_user() {
        let hub = NotificationHub::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut alice_rx = hub.subscribe(alice);
        let mut bob_rx = hub.subscribe(bob);

        let sent = hub.notify(alice, Notification::new("media.available", json!({"id": 1})));
        assert_eq!(sent, 1);
        assert_eq!(alice_rx.recv().await.unwrap().event, "media.available");
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_every_stream_of_a_user_receives() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let mut a = hub.subscribe(user);
        let mut b = hub.subscribe(user);
        assert_eq!(hub.notify(user, Notification::new("x", json!(null))), 2);
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_disconnected_channels_are_pruned() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        drop(hub.subscribe(user));
        assert_eq!(hub.connected_users(), 1);
        assert_eq!(hub.notify(user, Notification::new("x", json!(null))), 0);
        assert_eq!(hub.connected_users(), 0);
    }

    #[test]
    fn test_unknown_user_is_a_noop() {
        let hub = NotificationHub::new();
        assert_eq!(hub.notify(Uuid::new_v4(), Notification::new("x", json!(null))), 0);
    }
}
