//! Chunked upload handlers.
//!
//! Sessions are created at init, fed chunk-by-chunk over multipart, and
//! assembled at complete; completion hands the video to the pipeline and
//! returns immediately. Session-phase errors come back synchronously as
//! JSON; everything after the handoff is observed by polling the video.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use vodforge_core::AppError;
use vodforge_processing::InitUploadRequest;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitUploadBody {
    /// Original filename
    pub filename: String,
    /// Total file size in bytes
    pub file_size: u64,
    /// Content type (MIME type)
    pub mime_type: String,
    /// Display title; defaults to the filename
    #[serde(default)]
    pub title: Option<String>,
    /// Optional custom metadata
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitUploadResponse {
    pub upload_id: Uuid,
    pub video_id: Uuid,
    /// Total number of chunks the client must send
    pub total_chunks: u32,
    /// Size of each chunk in bytes (last chunk may be smaller)
    pub chunk_size: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadChunkResponse {
    pub received: bool,
    pub received_count: u32,
    pub total_chunks: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteUploadBody {
    pub upload_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub video_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadProgressResponse {
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub percent: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumeUploadResponse {
    /// Chunk indexes the client still needs to send, ascending
    pub missing_chunk_indexes: Vec<u32>,
}

/// Start a chunked upload session
#[utoipa::path(
    post,
    path = "/upload/init",
    tag = "upload",
    request_body = InitUploadBody,
    responses(
        (status = 200, description = "Upload session created", body = InitUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitUploadBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    let title = body.title.clone().unwrap_or_else(|| body.filename.clone());
    let (upload_id, video_id, total_chunks, chunk_size) = state
        .uploads
        .initialize_upload(InitUploadRequest {
            filename: body.filename,
            file_size: body.file_size,
            mime_type: body.mime_type,
            title,
            metadata: body.metadata,
        })
        .await?;

    Ok(Json(InitUploadResponse {
        upload_id,
        video_id,
        total_chunks,
        chunk_size,
    }))
}

/// Upload one chunk as multipart form data
///
/// Fields: `upload_id` (text), `chunk_index` (text), `chunk` (bytes).
/// Re-sending an index is idempotent.
#[utoipa::path(
    post,
    path = "/upload/chunk",
    tag = "upload",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk stored", body = UploadChunkResponse),
        (status = 400, description = "Malformed chunk or index out of range", body = ErrorResponse),
        (status = 404, description = "Unknown or expired upload session", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut upload_id: Option<Uuid> = None;
    let mut chunk_index: Option<u32> = None;
    let mut chunk: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("upload_id") => {
                let text = field.text().await.map_err(bad_field("upload_id"))?;
                upload_id = Some(
                    text.parse()
                        .map_err(|_| AppError::InvalidRequest("upload_id is not a UUID".into()))?,
                );
            }
            Some("chunk_index") => {
                let text = field.text().await.map_err(bad_field("chunk_index"))?;
                chunk_index = Some(text.parse().map_err(|_| {
                    AppError::InvalidRequest("chunk_index is not an unsigned integer".into())
                })?);
            }
            Some("chunk") => {
                chunk = Some(field.bytes().await.map_err(bad_field("chunk"))?);
            }
            _ => {}
        }
    }

    let upload_id =
        upload_id.ok_or_else(|| AppError::InvalidRequest("missing field upload_id".into()))?;
    let chunk_index =
        chunk_index.ok_or_else(|| AppError::InvalidRequest("missing field chunk_index".into()))?;
    let chunk = chunk.ok_or_else(|| AppError::InvalidRequest("missing field chunk".into()))?;
    if chunk.is_empty() {
        return Err(AppError::InvalidRequest("chunk is empty".into()).into());
    }

    let receipt = state
        .uploads
        .upload_chunk(upload_id, chunk_index, &chunk)
        .await?;

    Ok(Json(UploadChunkResponse {
        received: true,
        received_count: receipt.received_count,
        total_chunks: receipt.total_chunks,
    }))
}

/// Complete an upload: assemble the file and start processing
#[utoipa::path(
    post,
    path = "/upload/complete",
    tag = "upload",
    request_body = CompleteUploadBody,
    responses(
        (status = 202, description = "Assembly verified, processing started", body = CompleteUploadResponse),
        (status = 404, description = "Unknown or expired upload session", body = ErrorResponse),
        (status = 409, description = "Chunks missing", body = ErrorResponse),
        (status = 422, description = "Assembled size does not match declared size", body = ErrorResponse)
    )
)]
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CompleteUploadBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video_id = state.uploads.complete_upload(body.upload_id).await?;
    state.pipeline.spawn(video_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(CompleteUploadResponse {
            video_id,
            status: "processing".to_string(),
        }),
    ))
}

/// Upload progress for a session
#[utoipa::path(
    get,
    path = "/upload/{upload_id}/progress",
    tag = "upload",
    params(("upload_id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Progress snapshot", body = UploadProgressResponse),
        (status = 404, description = "Unknown or expired upload session", body = ErrorResponse)
    )
)]
pub async fn upload_progress(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let progress = state.uploads.get_progress(upload_id).await?;
    Ok(Json(UploadProgressResponse {
        received_chunks: progress.received_chunks,
        total_chunks: progress.total_chunks,
        percent: progress.percent,
    }))
}

/// Chunk indexes still missing, for resuming an interrupted upload
#[utoipa::path(
    get,
    path = "/upload/{upload_id}/resume",
    tag = "upload",
    params(("upload_id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Missing chunk indexes", body = ResumeUploadResponse),
        (status = 404, description = "Unknown or expired upload session", body = ErrorResponse)
    )
)]
pub async fn resume_upload(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let missing = state.uploads.missing_chunks(upload_id).await?;
    Ok(Json(ResumeUploadResponse {
        missing_chunk_indexes: missing,
    }))
}

/// Cancel an upload session and delete its fragments
#[utoipa::path(
    delete,
    path = "/upload/{upload_id}",
    tag = "upload",
    params(("upload_id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 204, description = "Session cancelled"),
        (status = 404, description = "Unknown or expired upload session", body = ErrorResponse)
    )
)]
pub async fn cancel_upload(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.uploads.cancel_upload(upload_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn bad_field(name: &'static str) -> impl Fn(axum::extract::multipart::MultipartError) -> AppError {
    move |e| AppError::InvalidRequest(format!("unreadable field {}: {}", name, e))
}
