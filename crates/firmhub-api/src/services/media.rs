//! Media uploads: quarantine in temporary storage until the antivirus consumer
//! releases the file.

use crate::auth::AuthUser;
use crate::middleware::audit::{self, AuditEventType};
use crate::services::firms;
use crate::state::AppState;
use crate::utils::upload::{
    sanitize_filename, validate_content_type, validate_file_extension, validate_file_size,
    UploadedFile,
};
use firmhub_core::constants::PRESIGNED_URL_TTL_SECS;
use firmhub_core::messages::FileUploaded;
use firmhub_core::models::{Media, MediaResponse, MediaStatus, MediaUrlResponse};
use firmhub_core::AppError;
use firmhub_db::NewMedia;
use firmhub_storage::keys;
use std::time::Duration;
use uuid::Uuid;

async fn load_media(state: &AppState, media_id: Uuid) -> Result<Media, AppError> {
    state
        .media
        .repository
        .get_by_id(media_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Media not found".to_string()))
}

/// Store the file under its temporary key, record it as `scanning` and queue the scan.
pub async fn upload(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    file: UploadedFile,
) -> Result<MediaResponse, AppError> {
    let media_config = &state.media;
    firms::load_owned_firm(state, user, firm_id).await?;

    validate_file_size(file.data.len(), media_config.max_file_size)?;
    let content_type = validate_content_type(&file.content_type, &media_config.allowed_content_types)?;
    let filename = sanitize_filename(&file.filename)?;
    let extension = validate_file_extension(&filename, &media_config.allowed_extensions)?;

    let media_id = Uuid::new_v4();
    let temp_key = keys::temp_key(firm_id, media_id, &extension);
    let final_key = keys::final_key(firm_id, media_id, &extension);
    let file_size = file.data.len() as i64;

    media_config
        .storage
        .put(&temp_key, file.data, &content_type)
        .await?;

    let media = match media_config
        .repository
        .create(NewMedia {
            id: media_id,
            firm_id,
            uploaded_by: user.user_id,
            original_filename: &filename,
            content_type: &content_type,
            file_size,
            temp_key: &temp_key,
        })
        .await
    {
        Ok(media) => media,
        Err(e) => {
            discard_object(state, &temp_key).await;
            return Err(e);
        }
    };

    let message = FileUploaded {
        media_id,
        firm_id,
        uploaded_by: user.user_id,
        temp_key: temp_key.clone(),
        final_key,
        content_type,
    };
    if let Err(e) = state.messaging.queue.publish(&message).await {
        // Without a queued scan the file would stay in quarantine forever.
        if let Err(del) = media_config.repository.delete(media_id).await {
            tracing::error!(error = %del, media_id = %media_id, "Failed to remove media row after publish failure");
        }
        discard_object(state, &temp_key).await;
        return Err(e.into());
    }

    audit::log_media_event(AuditEventType::MediaUploaded, Some(user.user_id), media_id, firm_id);
    tracing::info!(media_id = %media_id, firm_id = %firm_id, file_size, "Upload accepted, scan queued");

    Ok(media.into())
}

/// Best-effort removal of a stored object.
pub async fn discard_object(state: &AppState, key: &str) {
    if let Err(e) = state.media.storage.delete(key).await {
        tracing::error!(error = %e, storage_key = %key, "Failed to delete stored object");
    }
}

/// Media of a firm. Owners and administrators also see files still being scanned.
pub async fn list(
    state: &AppState,
    viewer: Option<&AuthUser>,
    firm_id: Uuid,
) -> Result<Vec<MediaResponse>, AppError> {
    let firm = firms::load_visible_firm(state, viewer, firm_id).await?;
    let privileged = viewer.is_some_and(|u| u.is_admin() || u.user_id == firm.owner_id);

    let media = state
        .media
        .repository
        .list_by_firm(firm_id, !privileged)
        .await?;
    Ok(media.into_iter().map(MediaResponse::from).collect())
}

pub async fn download_url(
    state: &AppState,
    viewer: Option<&AuthUser>,
    media_id: Uuid,
) -> Result<MediaUrlResponse, AppError> {
    let media = load_media(state, media_id).await?;
    let firm = firms::load_visible_firm(state, viewer, media.firm_id).await?;

    let storage_key = match (media.status, media.storage_key.as_deref()) {
        (MediaStatus::Available, Some(key)) => key,
        _ => {
            let privileged = viewer.is_some_and(|u| u.is_admin() || u.user_id == firm.owner_id);
            return Err(if privileged {
                AppError::Conflict("Media is still being scanned".to_string())
            } else {
                AppError::NotFound("Media not found".to_string())
            });
        }
    };

    let url = state
        .media
        .storage
        .presigned_url(storage_key, Duration::from_secs(PRESIGNED_URL_TTL_SECS))
        .await?;
    Ok(MediaUrlResponse {
        url,
        expires_in_secs: PRESIGNED_URL_TTL_SECS,
    })
}

/// Delete the row, then the stored object. Owner or administrator only.
pub async fn delete(state: &AppState, user: &AuthUser, media_id: Uuid) -> Result<(), AppError> {
    let media = load_media(state, media_id).await?;
    if !user.is_admin() {
        firms::load_owned_firm(state, user, media.firm_id).await?;
    }

    let Some(deleted) = state.media.repository.delete(media_id).await? else {
        return Err(AppError::NotFound("Media not found".to_string()));
    };
    discard_object(state, deleted.storage_key.as_deref().unwrap_or(&deleted.temp_key)).await;

    audit::log_media_event(AuditEventType::MediaDeleted, Some(user.user_id), media_id, media.firm_id);
    Ok(())
}
