//! Postgres-backed [`VideoStateStore`] wiring the processing crate's state
//! seam to the repositories.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use vodforge_core::models::{QualityPreset, Video};
use vodforge_core::AppError;
use vodforge_db::{RenditionRepository, VideoRepository};
use vodforge_processing::VideoStateStore;

pub struct DbVideoState {
    videos: VideoRepository,
    renditions: RenditionRepository,
}

impl DbVideoState {
    pub fn new(videos: VideoRepository, renditions: RenditionRepository) -> Self {
        Self { videos, renditions }
    }
}

#[async_trait]
impl VideoStateStore for DbVideoState {
    async fn create_video(
        &self,
        title: String,
        original_filename: String,
        mime_type: String,
        file_size_bytes: i64,
        metadata: Option<JsonValue>,
    ) -> Result<Video, AppError> {
        self.videos
            .create_video(title, original_filename, mime_type, file_size_bytes, metadata)
            .await
    }

    async fn get_video(&self, video_id: Uuid) -> Result<Option<Video>, AppError> {
        self.videos.get_video(video_id).await
    }

    async fn set_original_path(
        &self,
        video_id: Uuid,
        original_path: &str,
        file_size_bytes: i64,
    ) -> Result<(), AppError> {
        self.videos
            .set_original_path(video_id, original_path, file_size_bytes)
            .await
    }

    async fn mark_processing(&self, video_id: Uuid) -> Result<(), AppError> {
        self.videos.mark_processing(video_id).await
    }

    async fn mark_reprocessing(&self, video_id: Uuid) -> Result<(), AppError> {
        self.videos.mark_reprocessing(video_id).await
    }

    async fn mark_ready(
        &self,
        video_id: Uuid,
        hls_playlist_url: &str,
        duration_seconds: f64,
    ) -> Result<(), AppError> {
        self.videos
            .mark_ready(video_id, hls_playlist_url, duration_seconds)
            .await
    }

    async fn mark_error(&self, video_id: Uuid, message: &str) -> Result<(), AppError> {
        self.videos.mark_error(video_id, message).await
    }

    async fn update_progress(&self, video_id: Uuid, percent: i32) -> Result<(), AppError> {
        self.videos.update_progress(video_id, percent).await
    }

    async fn record_renditions(
        &self,
        video_id: Uuid,
        renditions: &[(QualityPreset, String)],
    ) -> Result<(), AppError> {
        self.renditions.replace_for_video(video_id, renditions).await
    }

    async fn mark_upload_expired(&self, video_id: Uuid) -> Result<(), AppError> {
        self.videos.mark_upload_expired(video_id).await
    }
}
