//! `media.file_uploaded` consumer: scan the quarantined object, then publish or destroy it.

use crate::middleware::audit::{self, AuditEventType};
use crate::notifications::Notification;
use crate::state::AppState;
use firmhub_core::messages::FileUploaded;
use firmhub_core::models::MediaStatus;
use firmhub_services::ScanVerdict;
use firmhub_storage::StorageError;
use firmhub_worker::ConsumerError;

pub const EVENT_MEDIA_AVAILABLE: &str = "media.available";
pub const EVENT_MEDIA_INFECTED: &str = "media.infected";

pub async fn process(state: &AppState, event: &FileUploaded) -> Result<(), ConsumerError> {
    let media = state
        .media
        .repository
        .get_by_id(event.media_id)
        .await
        .map_err(ConsumerError::recoverable)?;

    let Some(media) = media else {
        tracing::info!(media_id = %event.media_id, "Media deleted before scan, discarding upload");
        delete_object(state, &event.temp_key).await;
        return Ok(());
    };
    if media.status != MediaStatus::Scanning {
        tracing::debug!(media_id = %media.id, status = %media.status, "Media already scanned");
        return Ok(());
    }

    let data = match state.media.storage.download(&event.temp_key).await {
        Ok(data) => data,
        Err(StorageError::NotFound(key)) => {
            return Err(ConsumerError::unrecoverable(anyhow::anyhow!(
                "Quarantined object {} is missing",
                key
            )));
        }
        Err(e) => return Err(ConsumerError::recoverable(e)),
    };

    let verdict = state
        .media
        .scanner
        .scan(&data)
        .await
        .map_err(ConsumerError::recoverable)?;

    match verdict {
        ScanVerdict::Infected(signature) => quarantine(state, event, &signature).await,
        ScanVerdict::Clean => publish(state, event).await,
    }
}

async fn quarantine(
    state: &AppState,
    event: &FileUploaded,
    signature: &str,
) -> Result<(), ConsumerError> {
    tracing::warn!(
        media_id = %event.media_id,
        firm_id = %event.firm_id,
        signature = %signature,
        "Infected upload removed"
    );

    state
        .media
        .repository
        .delete(event.media_id)
        .await
        .map_err(ConsumerError::recoverable)?;
    delete_object(state, &event.temp_key).await;

    state.messaging.notifications.notify(
        event.uploaded_by,
        Notification::new(
            EVENT_MEDIA_INFECTED,
            serde_json::json!({ "media_id": event.media_id, "firm_id": event.firm_id }),
        ),
    );
    audit::log_media_event(
        AuditEventType::MediaQuarantined,
        Some(event.uploaded_by),
        event.media_id,
        event.firm_id,
    );
    Ok(())
}

async fn publish(state: &AppState, event: &FileUploaded) -> Result<(), ConsumerError> {
    let storage = &state.media.storage;
    storage
        .copy(&event.temp_key, &event.final_key)
        .await
        .map_err(ConsumerError::recoverable)?;

    let updated = state
        .media
        .repository
        .mark_available(event.media_id, &event.final_key)
        .await
        .map_err(ConsumerError::recoverable)?;

    let Some(media) = updated else {
        // Deleted while the scan ran
        delete_object(state, &event.final_key).await;
        delete_object(state, &event.temp_key).await;
        return Ok(());
    };
    delete_object(state, &event.temp_key).await;

    tracing::info!(media_id = %media.id, key = %event.final_key, "Media available");
    state.messaging.notifications.notify(
        event.uploaded_by,
        Notification::new(
            EVENT_MEDIA_AVAILABLE,
            serde_json::json!({
                "media_id": media.id,
                "firm_id": media.firm_id,
                "content_type": media.content_type,
            }),
        ),
    );
    Ok(())
}

/// Best-effort removal; a leftover object is only logged.
async fn delete_object(state: &AppState, key: &str) {
    match state.media.storage.delete(key).await {
        Ok(()) | Err(StorageError::NotFound(_)) => {}
        Err(e) => tracing::warn!(error = %e, key = %key, "Failed to delete stored object"),
    }
}
