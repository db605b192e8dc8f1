//! Abstraction over the authoritative video record.
//!
//! The pipeline, upload manager, and reaper mutate video state through this
//! trait; the API crate implements it over the sqlx repositories. Tests use
//! an in-memory implementation so orchestration logic runs without Postgres.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use vodforge_core::models::{QualityPreset, Video};
use vodforge_core::AppError;

#[async_trait]
pub trait VideoStateStore: Send + Sync {
    /// Create a pending video row at upload init.
    async fn create_video(
        &self,
        title: String,
        original_filename: String,
        mime_type: String,
        file_size_bytes: i64,
        metadata: Option<JsonValue>,
    ) -> Result<Video, AppError>;

    async fn get_video(&self, video_id: Uuid) -> Result<Option<Video>, AppError>;

    /// Record the local path of the assembled source.
    async fn set_original_path(
        &self,
        video_id: Uuid,
        original_path: &str,
        file_size_bytes: i64,
    ) -> Result<(), AppError>;

    /// `pending|ready|error → processing`, progress reset to 0. Used by the
    /// upload completion handoff.
    async fn mark_processing(&self, video_id: Uuid) -> Result<(), AppError>;

    /// `ready|error → processing` only. A pending video is rejected so a
    /// reprocess request cannot steal a video whose upload is still in
    /// flight.
    async fn mark_reprocessing(&self, video_id: Uuid) -> Result<(), AppError>;

    /// `processing → ready` with the published master playlist URL.
    async fn mark_ready(
        &self,
        video_id: Uuid,
        hls_playlist_url: &str,
        duration_seconds: f64,
    ) -> Result<(), AppError>;

    /// `→ error` with a message naming the failing stage.
    async fn mark_error(&self, video_id: Uuid, message: &str) -> Result<(), AppError>;

    /// Persist mapped progress; implementations must never move the stored
    /// value downward.
    async fn update_progress(&self, video_id: Uuid, percent: i32) -> Result<(), AppError>;

    /// Replace the rendition rows for a video after a successful run.
    async fn record_renditions(
        &self,
        video_id: Uuid,
        renditions: &[(QualityPreset, String)],
    ) -> Result<(), AppError>;

    /// Mark a pending video whose upload session expired without completing.
    async fn mark_upload_expired(&self, video_id: Uuid) -> Result<(), AppError>;
}
