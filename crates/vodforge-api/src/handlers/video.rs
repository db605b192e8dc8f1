//! Video status and reprocessing handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use vodforge_core::models::VideoStatus;
use vodforge_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoStatusResponse {
    pub video_id: Uuid,
    pub status: VideoStatus,
    /// 0–100, monotone while processing
    pub processing_progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_playlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReprocessResponse {
    pub video_id: Uuid,
    pub status: String,
}

/// Poll processing state for a video
#[utoipa::path(
    get,
    path = "/videos/{video_id}/status",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Current processing state", body = VideoStatusResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn video_status(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or(AppError::VideoNotFound(video_id))?;

    Ok(Json(VideoStatusResponse {
        video_id: video.id,
        status: video.status,
        processing_progress: video.processing_progress,
        hls_playlist_url: video.hls_playlist_url,
        error_message: video.error_message,
        duration_seconds: video.duration_seconds,
    }))
}

/// Re-run the transcode pipeline for a ready or failed video
///
/// The source is re-resolved (local file, or the retained original in object
/// storage) and rendition rows are replaced on success.
#[utoipa::path(
    post,
    path = "/videos/{video_id}/reprocess",
    tag = "videos",
    params(("video_id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 202, description = "Reprocess started", body = ReprocessResponse),
        (status = 400, description = "Video is pending or already processing", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn reprocess_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.videos.mark_reprocessing(video_id).await?;
    state.pipeline.spawn(video_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(ReprocessResponse {
            video_id,
            status: "processing".to_string(),
        }),
    ))
}
