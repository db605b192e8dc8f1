use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Processing state of a video. Transitions are owned by the pipeline:
/// `pending → processing → {ready | error}`, with `ready | error →
/// processing` on an explicit reprocess.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "video_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoStatus::Pending => write!(f, "pending"),
            VideoStatus::Processing => write!(f, "processing"),
            VideoStatus::Ready => write!(f, "ready"),
            VideoStatus::Error => write!(f, "error"),
        }
    }
}

impl VideoStatus {
    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Ready)
                | (Processing, Error)
                | (Ready, Processing)
                | (Error, Processing)
        )
    }
}

/// A video record: the single source of truth shared with the CRUD
/// collaborator. Owned and mutated exclusively by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    /// Public identifier exposed to clients.
    pub uuid: Uuid,
    pub title: String,
    pub original_filename: String,
    pub mime_type: String,
    pub status: VideoStatus,
    /// Monotonically non-decreasing 0–100 during processing.
    pub processing_progress: i32,
    pub duration_seconds: Option<f64>,
    pub file_size_bytes: i64,
    /// Local filesystem path of the assembled source, if still present.
    pub original_path: Option<String>,
    /// Public URL of the published master playlist once ready.
    pub hls_playlist_url: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_state_machine() {
        use VideoStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Ready));
        assert!(Processing.can_transition_to(Error));
        assert!(Ready.can_transition_to(Processing));
        assert!(Error.can_transition_to(Processing));

        assert!(!Pending.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Error));
        assert!(!Error.can_transition_to(Ready));
    }
}
