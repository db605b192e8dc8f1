//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vodforge API",
        version = "0.1.0",
        description = "Chunked video upload, HLS transcoding, and object-storage publishing. Upload a source in chunks, complete the session, then poll the video status until the master playlist URL appears."
    ),
    paths(
        handlers::upload::init_upload,
        handlers::upload::upload_chunk,
        handlers::upload::complete_upload,
        handlers::upload::upload_progress,
        handlers::upload::resume_upload,
        handlers::upload::cancel_upload,
        handlers::video::video_status,
        handlers::video::reprocess_video,
        handlers::health::health,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::upload::InitUploadBody,
        handlers::upload::InitUploadResponse,
        handlers::upload::UploadChunkResponse,
        handlers::upload::CompleteUploadBody,
        handlers::upload::CompleteUploadResponse,
        handlers::upload::UploadProgressResponse,
        handlers::upload::ResumeUploadResponse,
        handlers::video::VideoStatusResponse,
        handlers::video::ReprocessResponse,
        vodforge_core::models::VideoStatus,
    )),
    tags(
        (name = "upload", description = "Chunked upload sessions"),
        (name = "videos", description = "Processing state and reprocessing"),
        (name = "health", description = "Service probes")
    )
)]
pub struct ApiDoc;
