//! Error types module
//!
//! All errors are unified under the `AppError` enum: upload-session errors
//! (returned synchronously to HTTP callers) and pipeline errors (recorded on
//! the video row and observed by polling). Each variant carries a stable
//! machine-readable code via [`AppError::error_code`].
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature so non-database crates can depend on the taxonomy alone.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload session not found: {0}")]
    UploadNotFound(uuid::Uuid),

    #[error("Chunk index {index} out of range [0, {total})")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("Upload incomplete: {} chunks missing", missing.len())]
    IncompleteUpload { missing: Vec<u32> },

    #[error("Assembled file size {actual} bytes does not match declared size {expected} bytes")]
    CorruptUpload { expected: u64, actual: u64 },

    #[error("Source not found for video {0}")]
    SourceNotFound(uuid::Uuid),

    #[error("Transcode failed at stage '{stage}': {detail}")]
    TranscodeFailure { stage: String, detail: String },

    #[error("Publish failed: {0}")]
    PublishFailure(String),

    #[error("Video not found: {0}")]
    VideoNotFound(uuid::Uuid),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Stable machine-readable code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UploadNotFound(_) => "UPLOAD_NOT_FOUND",
            AppError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            AppError::IncompleteUpload { .. } => "INCOMPLETE_UPLOAD",
            AppError::CorruptUpload { .. } => "CORRUPT_UPLOAD",
            AppError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            AppError::TranscodeFailure { .. } => "TRANSCODE_FAILURE",
            AppError::PublishFailure(_) => "PUBLISH_FAILURE",
            AppError::VideoNotFound(_) => "VIDEO_NOT_FOUND",
            #[cfg(feature = "sqlx")]
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for the synchronous error surface.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidRequest(_) => 400,
            AppError::UploadNotFound(_) => 404,
            AppError::IndexOutOfRange { .. } => 400,
            AppError::IncompleteUpload { .. } => 409,
            AppError::CorruptUpload { .. } => 422,
            AppError::SourceNotFound(_) => 404,
            AppError::TranscodeFailure { .. } => 500,
            AppError::PublishFailure(_) => 500,
            AppError::VideoNotFound(_) => 404,
            #[cfg(feature = "sqlx")]
            AppError::Database(_) => 500,
            AppError::Storage(_) => 500,
            AppError::Internal(_) => 500,
            AppError::InternalWithSource { .. } => 500,
        }
    }

    /// True for errors caused by the client request rather than the service.
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    /// Stage name plus diagnostic excerpt, recorded on the video row when the
    /// pipeline fails.
    pub fn pipeline_message(&self) -> String {
        match self {
            AppError::TranscodeFailure { stage, detail } => {
                format!("{}: {}", stage, detail)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = AppError::UploadNotFound(uuid::Uuid::nil());
        assert_eq!(err.error_code(), "UPLOAD_NOT_FOUND");
        assert_eq!(err.http_status(), 404);

        let err = AppError::IncompleteUpload {
            missing: vec![2, 5],
        };
        assert_eq!(err.error_code(), "INCOMPLETE_UPLOAD");
        assert_eq!(err.http_status(), 409);
        assert!(err.is_client_error());
    }

    #[test]
    fn incomplete_upload_display_counts_missing() {
        let err = AppError::IncompleteUpload {
            missing: vec![0, 1, 2],
        };
        assert_eq!(err.to_string(), "Upload incomplete: 3 chunks missing");
    }

    #[test]
    fn transcode_failure_pipeline_message_names_stage() {
        let err = AppError::TranscodeFailure {
            stage: "encode:720p".to_string(),
            detail: "ffmpeg exited with status 1".to_string(),
        };
        assert_eq!(
            err.pipeline_message(),
            "encode:720p: ffmpeg exited with status 1"
        );
    }
}
