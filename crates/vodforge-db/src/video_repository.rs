use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use vodforge_core::models::{Video, VideoStatus};
use vodforge_core::AppError;

/// Repository for the videos table. The pipeline is the only writer; the
/// external CRUD collaborator reads through the same rows.
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

const SELECT_VIDEO: &str = r#"
    SELECT id, uuid, title, original_filename, mime_type, status,
           processing_progress, duration_seconds, file_size_bytes,
           original_path, hls_playlist_url, error_message, metadata,
           created_at, updated_at
    FROM videos
"#;

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending video row at upload init.
    pub async fn create_video(
        &self,
        title: String,
        original_filename: String,
        mime_type: String,
        file_size_bytes: i64,
        metadata: Option<JsonValue>,
    ) -> Result<Video, AppError> {
        let id = Uuid::new_v4();
        let public_uuid = Uuid::new_v4();

        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos (
                id, uuid, title, original_filename, mime_type, status,
                processing_progress, file_size_bytes, metadata
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $7)
            RETURNING {}
            "#,
            SELECT_VIDEO_COLUMNS
        ))
        .bind(id)
        .bind(public_uuid)
        .bind(title)
        .bind(original_filename)
        .bind(mime_type)
        .bind(file_size_bytes)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    pub async fn get_video(&self, video_id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<_, Video>(&format!("{} WHERE id = $1", SELECT_VIDEO))
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    /// Record where the assembled source file landed on local disk.
    pub async fn set_original_path(
        &self,
        video_id: Uuid,
        original_path: &str,
        file_size_bytes: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET original_path = $2, file_size_bytes = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .bind(original_path)
        .bind(file_size_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Enter the processing state, resetting progress and any prior error.
    /// Guarded so an illegal transition (e.g. a duplicate completion racing
    /// a run already in flight) is rejected.
    pub async fn mark_processing(&self, video_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'processing', processing_progress = 0,
                error_message = NULL, updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'ready', 'error')
            "#,
        )
        .bind(video_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_video(video_id).await?;
            return match current {
                None => Err(AppError::VideoNotFound(video_id)),
                Some(v) => Err(AppError::InvalidRequest(format!(
                    "video {} cannot enter processing from status '{}'",
                    video_id, v.status
                ))),
            };
        }
        Ok(())
    }

    /// Re-enter processing for a finished video. Unlike [`mark_processing`],
    /// a pending video is rejected: its upload is still in flight and the
    /// completion handoff owns the first transition.
    ///
    /// [`mark_processing`]: VideoRepository::mark_processing
    pub async fn mark_reprocessing(&self, video_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'processing', processing_progress = 0,
                error_message = NULL, updated_at = now()
            WHERE id = $1 AND status IN ('ready', 'error')
            "#,
        )
        .bind(video_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_video(video_id).await?;
            return match current {
                None => Err(AppError::VideoNotFound(video_id)),
                Some(v) => Err(AppError::InvalidRequest(format!(
                    "video {} cannot be reprocessed from status '{}'",
                    video_id, v.status
                ))),
            };
        }
        Ok(())
    }

    /// Commit a successful pipeline run.
    pub async fn mark_ready(
        &self,
        video_id: Uuid,
        hls_playlist_url: &str,
        duration_seconds: f64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = 'ready', processing_progress = 100,
                hls_playlist_url = $2, duration_seconds = $3,
                error_message = NULL, updated_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(video_id)
        .bind(hls_playlist_url)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a pipeline failure; the message names the failing stage.
    pub async fn mark_error(&self, video_id: Uuid, message: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = 'error', error_message = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist mapped pipeline progress. GREATEST keeps the stored value
    /// monotonic under out-of-order callback delivery.
    pub async fn update_progress(&self, video_id: Uuid, percent: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET processing_progress = GREATEST(processing_progress, $2),
                updated_at = now()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(video_id)
        .bind(percent.clamp(0, 100))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current status snapshot for polling; avoids hauling the full row.
    pub async fn get_status(
        &self,
        video_id: Uuid,
    ) -> Result<Option<(VideoStatus, i32)>, AppError> {
        let row: Option<(VideoStatus, i32)> =
            sqlx::query_as("SELECT status, processing_progress FROM videos WHERE id = $1")
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Mark pending videos whose upload session expired without completing.
    pub async fn mark_upload_expired(&self, video_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = 'error', error_message = 'upload expired', updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(video_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

const SELECT_VIDEO_COLUMNS: &str = r#"id, uuid, title, original_filename, mime_type, status,
           processing_progress, duration_seconds, file_size_bytes,
           original_path, hls_playlist_url, error_message, metadata,
           created_at, updated_at"#;
