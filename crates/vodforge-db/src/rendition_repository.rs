use sqlx::PgPool;
use uuid::Uuid;

use vodforge_core::models::{QualityPreset, Rendition};
use vodforge_core::AppError;

/// Repository for the video_renditions table.
#[derive(Clone)]
pub struct RenditionRepository {
    pool: PgPool,
}

impl RenditionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the rendition set for a video inside one transaction. Called
    /// once per successful pipeline run so a reprocess never leaves stale
    /// rows behind.
    pub async fn replace_for_video(
        &self,
        video_id: Uuid,
        renditions: &[(QualityPreset, String)],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM video_renditions WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        for (preset, playlist_key) in renditions {
            sqlx::query(
                r#"
                INSERT INTO video_renditions (id, video_id, label, width, height, bitrate, playlist_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(video_id)
            .bind(preset.label)
            .bind(preset.width as i32)
            .bind(preset.height as i32)
            .bind(preset.bitrate as i64)
            .bind(playlist_key)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_video(&self, video_id: Uuid) -> Result<Vec<Rendition>, AppError> {
        let rows = sqlx::query_as::<_, Rendition>(
            r#"
            SELECT id, video_id, label, width, height, bitrate, playlist_key, created_at
            FROM video_renditions
            WHERE video_id = $1
            ORDER BY bitrate ASC
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
