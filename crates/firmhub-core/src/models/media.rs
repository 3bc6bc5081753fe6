use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Scan lifecycle of an uploaded file. Infected uploads are deleted, so only
/// `Scanning` and `Available` are ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Scanning,
    Available,
    Infected,
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaStatus::Scanning => write!(f, "scanning"),
            MediaStatus::Available => write!(f, "available"),
            MediaStatus::Infected => write!(f, "infected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Media {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub uploaded_by: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub temp_key: String,
    pub storage_key: Option<String>,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MediaResponse {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Media> for MediaResponse {
    fn from(media: Media) -> Self {
        MediaResponse {
            id: media.id,
            firm_id: media.firm_id,
            original_filename: media.original_filename,
            content_type: media.content_type,
            file_size: media.file_size,
            status: media.status,
            created_at: media.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MediaUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}
