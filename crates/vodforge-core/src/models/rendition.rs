use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One encoded variant of a video at a fixed resolution/bitrate. Recorded
/// only after its encode step fully succeeded; never partially persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Rendition {
    pub id: Uuid,
    pub video_id: Uuid,
    /// Quality label, e.g. "720p".
    pub label: String,
    pub width: i32,
    pub height: i32,
    /// Video bitrate in bits per second.
    pub bitrate: i64,
    /// Object key of this rendition's variant playlist.
    pub playlist_key: String,
    pub created_at: DateTime<Utc>,
}
