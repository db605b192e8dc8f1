//! Expired upload session reaper.
//!
//! Sessions that pass their TTL without completing are swept on an interval:
//! the session and its fragment directory are deleted and the pending video
//! row is marked with an upload-expired error.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::chunk_store::ChunkStore;
use crate::session::SessionStore;
use crate::video_state::VideoStateStore;

pub struct SessionReaper {
    sessions: Arc<dyn SessionStore>,
    chunks: ChunkStore,
    videos: Arc<dyn VideoStateStore>,
    interval_secs: u64,
}

impl SessionReaper {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        chunks: ChunkStore,
        videos: Arc<dyn VideoStateStore>,
        interval_secs: u64,
    ) -> Self {
        Self {
            sessions,
            chunks,
            videos,
            interval_secs,
        }
    }

    /// Spawn the periodic sweep. An interval of 0 disables the reaper.
    pub fn spawn(self) {
        if self.interval_secs == 0 {
            tracing::info!("Upload session reaper disabled");
            return;
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(self.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        });
    }

    /// One sweep pass. Returns the number of sessions reaped.
    pub async fn sweep_once(&self) -> usize {
        let expired = self.sessions.remove_expired(Utc::now()).await;
        for session in &expired {
            if let Err(e) = self.chunks.remove_upload(session.upload_id).await {
                tracing::warn!(
                    upload_id = %session.upload_id,
                    error = %e,
                    "Failed to remove fragments of expired session"
                );
            }
            if let Err(e) = self.videos.mark_upload_expired(session.video_id).await {
                tracing::warn!(
                    video_id = %session.video_id,
                    error = %e,
                    "Failed to mark video for expired upload"
                );
            }
            tracing::info!(
                upload_id = %session.upload_id,
                video_id = %session.video_id,
                "Reaped expired upload session"
            );
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use crate::video_state::tests_support::MemoryVideoStore;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use uuid::Uuid;
    use vodforge_core::models::{UploadSession, VideoStatus};

    #[tokio::test]
    async fn sweep_removes_expired_sessions_and_marks_videos() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(InMemorySessionStore::new());
        let chunks = ChunkStore::new(dir.path());
        let videos = Arc::new(MemoryVideoStore::new());

        let stale_video = videos
            .create_video(
                "Stale".to_string(),
                "stale.mp4".to_string(),
                "video/mp4".to_string(),
                8,
                None,
            )
            .await
            .unwrap();
        let fresh_video = videos
            .create_video(
                "Fresh".to_string(),
                "fresh.mp4".to_string(),
                "video/mp4".to_string(),
                8,
                None,
            )
            .await
            .unwrap();

        let now = Utc::now();
        let mut make = |video_id, expires_at| UploadSession {
            upload_id: Uuid::new_v4(),
            video_id,
            total_chunks: 2,
            received: HashSet::new(),
            chunk_size_bytes: 4,
            expected_file_size: 8,
            original_filename: "f.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: now,
            expires_at,
        };
        let stale = make(stale_video.id, now - ChronoDuration::seconds(1));
        let fresh = make(fresh_video.id, now + ChronoDuration::hours(1));
        let stale_upload = stale.upload_id;
        let fresh_upload = fresh.upload_id;

        chunks.write_chunk(stale_upload, 0, b"aaaa").await.unwrap();
        sessions.put(stale).await;
        sessions.put(fresh).await;

        let reaper = SessionReaper::new(sessions.clone(), chunks, videos.clone(), 300);
        assert_eq!(reaper.sweep_once().await, 1);

        assert!(sessions.get(stale_upload).await.is_none());
        assert!(sessions.get(fresh_upload).await.is_some());
        assert!(!dir.path().join(stale_upload.to_string()).exists());

        let stale_video = videos.get(stale_video.id);
        assert_eq!(stale_video.status, VideoStatus::Error);
        assert_eq!(
            stale_video.error_message.as_deref(),
            Some("upload session expired")
        );
        assert_eq!(videos.get(fresh_video.id).status, VideoStatus::Pending);
    }
}
