//! Server-sent event stream of the caller's notifications.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::notifications::NotificationHub;
use crate::state::AppState;

/// Drops the user's channel once their last stream closes.
struct PruneOnDrop {
    hub: NotificationHub,
    user_id: Uuid,
}

impl Drop for PruneOnDrop {
    fn drop(&mut self) {
        self.hub.prune(self.user_id);
    }
}

/// Subscribe to scan results and moderation decisions
///
/// Events: `media.available`, `media.infected`, `firm.status` (any status change made by
/// an administrator or by billing). Notifications sent while the client is disconnected
/// are not replayed.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses((status = 200, description = "text/event-stream of notifications")),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn stream(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.messaging.notifications.clone();
    let receiver = hub.subscribe(user.user_id);
    let guard = PruneOnDrop {
        hub,
        user_id: user.user_id,
    };
    tracing::debug!("Notification stream opened");

    let events = BroadcastStream::new(receiver).filter_map(move |item| {
        let _guard = &guard;
        let event = match item {
            Ok(notification) => match Event::default()
                .event(notification.event.as_str())
                .json_data(&notification.data)
            {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode notification");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification stream lagged");
                None
            }
        };
        futures::future::ready(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
