//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; `AppError`
//! values convert via `From` and render as a JSON `ErrorResponse` with the
//! status from [`AppError::http_status`]. The wrapper exists because of the
//! orphan rule: `IntoResponse` cannot be implemented for `AppError` here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use vodforge_core::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Structured detail for variants a client acts on programmatically.
fn details_for(error: &AppError) -> Option<serde_json::Value> {
    match error {
        AppError::IncompleteUpload { missing } => Some(serde_json::json!({
            "missing_chunk_indexes": missing,
        })),
        AppError::IndexOutOfRange { index, total } => Some(serde_json::json!({
            "index": index,
            "total_chunks": total,
        })),
        AppError::CorruptUpload { expected, actual } => Some(serde_json::json!({
            "expected_bytes": expected,
            "actual_bytes": actual,
        })),
        _ => None,
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let error = &self.0;
        let status =
            StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if error.is_client_error() {
            tracing::debug!(error = %error, code = error.error_code(), "Request rejected");
        } else {
            tracing::error!(error = %error, code = error.error_code(), "Request failed");
        }

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: error.error_code().to_string(),
            details: details_for(error),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_upload_carries_missing_indices() {
        let details = details_for(&AppError::IncompleteUpload {
            missing: vec![1, 4],
        })
        .unwrap();
        assert_eq!(details["missing_chunk_indexes"], serde_json::json!([1, 4]));
    }

    #[test]
    fn plain_errors_have_no_details() {
        assert!(details_for(&AppError::InvalidRequest("nope".to_string())).is_none());
    }
}
