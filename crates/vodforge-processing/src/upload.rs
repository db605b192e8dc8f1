//! Upload session manager.
//!
//! Tracks chunk receipt, detects completeness, assembles the source file, and
//! hands the video off to the pipeline. Session-phase errors are returned
//! synchronously; nothing here blocks on transcoding.

use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use vodforge_core::constants::MAX_CHUNK_COUNT;
use vodforge_core::models::UploadSession;
use vodforge_core::{AppError, UploadConfig};

use crate::chunk_store::ChunkStore;
use crate::session::SessionStore;
use crate::video_state::VideoStateStore;

/// Parameters for `initialize_upload`.
#[derive(Debug, Clone)]
pub struct InitUploadRequest {
    pub filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub title: String,
    pub metadata: Option<JsonValue>,
}

/// Returned after each chunk write.
#[derive(Debug, Clone, Copy)]
pub struct ChunkReceipt {
    pub received_count: u32,
    pub total_chunks: u32,
}

/// Snapshot for the progress endpoint.
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub percent: f64,
}

pub struct UploadManager {
    sessions: Arc<dyn SessionStore>,
    chunks: ChunkStore,
    videos: Arc<dyn VideoStateStore>,
    config: UploadConfig,
}

impl UploadManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        chunks: ChunkStore,
        videos: Arc<dyn VideoStateStore>,
        config: UploadConfig,
    ) -> Self {
        Self {
            sessions,
            chunks,
            videos,
            config,
        }
    }

    /// Where the assembled source for a video lands.
    fn source_path(&self, video_id: Uuid, filename: &str) -> PathBuf {
        PathBuf::from(&self.config.upload_dir)
            .join("sources")
            .join(video_id.to_string())
            .join(sanitize_filename(filename))
    }

    /// Create the video row and the upload session.
    pub async fn initialize_upload(
        &self,
        request: InitUploadRequest,
    ) -> Result<(Uuid, Uuid, u32, u64), AppError> {
        if request.file_size == 0 {
            return Err(AppError::InvalidRequest(
                "file_size must be greater than 0".to_string(),
            ));
        }
        if request.file_size > self.config.max_file_size_bytes {
            return Err(AppError::InvalidRequest(format!(
                "file_size {} exceeds maximum {}",
                request.file_size, self.config.max_file_size_bytes
            )));
        }

        let chunk_size = self.config.chunk_size_bytes;
        let total_chunks = UploadSession::chunk_count(request.file_size, chunk_size);
        if total_chunks > MAX_CHUNK_COUNT {
            return Err(AppError::InvalidRequest(format!(
                "chunk count {} exceeds maximum {}",
                total_chunks, MAX_CHUNK_COUNT
            )));
        }

        let video = self
            .videos
            .create_video(
                request.title,
                request.filename.clone(),
                request.mime_type.clone(),
                request.file_size as i64,
                request.metadata,
            )
            .await?;

        let now = Utc::now();
        let session = UploadSession {
            upload_id: Uuid::new_v4(),
            video_id: video.id,
            total_chunks,
            received: Default::default(),
            chunk_size_bytes: chunk_size,
            expected_file_size: request.file_size,
            original_filename: request.filename,
            mime_type: request.mime_type,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.session_ttl_secs as i64),
        };
        let upload_id = session.upload_id;
        self.sessions.put(session).await;

        tracing::info!(
            upload_id = %upload_id,
            video_id = %video.id,
            total_chunks = total_chunks,
            "Upload session initialized"
        );

        Ok((upload_id, video.id, total_chunks, chunk_size))
    }

    /// Write one chunk. Idempotent per index; the received-set mutation is
    /// atomic inside the session store.
    pub async fn upload_chunk(
        &self,
        upload_id: Uuid,
        chunk_index: u32,
        data: &[u8],
    ) -> Result<ChunkReceipt, AppError> {
        let session = self.live_session(upload_id).await?;

        if chunk_index >= session.total_chunks {
            return Err(AppError::IndexOutOfRange {
                index: chunk_index,
                total: session.total_chunks,
            });
        }

        self.chunks.write_chunk(upload_id, chunk_index, data).await?;

        let updated = self
            .sessions
            .mark_received(upload_id, chunk_index)
            .await
            .ok_or(AppError::UploadNotFound(upload_id))?;

        Ok(ChunkReceipt {
            received_count: updated.received.len() as u32,
            total_chunks: updated.total_chunks,
        })
    }

    /// Assemble the source and move the video into processing. Returns the
    /// video id; the caller spawns the pipeline and this returns before any
    /// transcoding happens.
    pub async fn complete_upload(&self, upload_id: Uuid) -> Result<Uuid, AppError> {
        let session = self.live_session(upload_id).await?;

        let missing = session.missing_indexes();
        if !missing.is_empty() {
            return Err(AppError::IncompleteUpload { missing });
        }

        let dest = self.source_path(session.video_id, &session.original_filename);
        let assembled = self
            .chunks
            .assemble(upload_id, session.total_chunks, &dest)
            .await?;

        if assembled != session.expected_file_size {
            // Keep fragments so the client can re-send the bad chunk and retry.
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(AppError::CorruptUpload {
                expected: session.expected_file_size,
                actual: assembled,
            });
        }

        self.chunks.remove_upload(upload_id).await?;
        self.sessions.remove(upload_id).await;

        self.videos
            .set_original_path(
                session.video_id,
                &dest.to_string_lossy(),
                assembled as i64,
            )
            .await?;
        self.videos.mark_processing(session.video_id).await?;

        tracing::info!(
            upload_id = %upload_id,
            video_id = %session.video_id,
            bytes = assembled,
            "Upload assembled, handing off to transcoder"
        );

        Ok(session.video_id)
    }

    pub async fn get_progress(&self, upload_id: Uuid) -> Result<UploadProgress, AppError> {
        let session = self.live_session(upload_id).await?;
        Ok(UploadProgress {
            received_chunks: session.received.len() as u32,
            total_chunks: session.total_chunks,
            percent: session.percent(),
        })
    }

    /// Indexes the client still needs to send, so it can resume without
    /// re-sending completed chunks.
    pub async fn missing_chunks(&self, upload_id: Uuid) -> Result<Vec<u32>, AppError> {
        let session = self.live_session(upload_id).await?;
        Ok(session.missing_indexes())
    }

    /// Delete all fragments and the session. Does not affect a transcode
    /// already handed off.
    pub async fn cancel_upload(&self, upload_id: Uuid) -> Result<(), AppError> {
        let session = self
            .sessions
            .remove(upload_id)
            .await
            .ok_or(AppError::UploadNotFound(upload_id))?;

        self.chunks.remove_upload(upload_id).await?;
        self.videos
            .mark_error(session.video_id, "upload cancelled")
            .await?;

        tracing::info!(upload_id = %upload_id, video_id = %session.video_id, "Upload cancelled");
        Ok(())
    }

    /// Fetch a session, treating an expired one as missing.
    async fn live_session(&self, upload_id: Uuid) -> Result<UploadSession, AppError> {
        let session = self
            .sessions
            .get(upload_id)
            .await
            .ok_or(AppError::UploadNotFound(upload_id))?;

        if session.is_expired(Utc::now()) {
            self.sessions.remove(upload_id).await;
            let _ = self.chunks.remove_upload(upload_id).await;
            return Err(AppError::UploadNotFound(upload_id));
        }
        Ok(session)
    }
}

/// Strip path components from a client-supplied filename.
fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload.bin".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use crate::video_state::tests_support::MemoryVideoStore;

    fn upload_config(dir: &std::path::Path) -> UploadConfig {
        UploadConfig {
            upload_dir: dir.to_string_lossy().to_string(),
            chunk_size_bytes: 4,
            max_file_size_bytes: 1024 * 1024,
            session_ttl_secs: 3600,
            reap_interval_secs: 0,
        }
    }

    fn manager(dir: &std::path::Path) -> (UploadManager, Arc<MemoryVideoStore>) {
        let videos = Arc::new(MemoryVideoStore::new());
        let manager = UploadManager::new(
            Arc::new(InMemorySessionStore::new()),
            ChunkStore::new(dir.join("chunks")),
            videos.clone(),
            upload_config(dir),
        );
        (manager, videos)
    }

    fn init_request(file_size: u64) -> InitUploadRequest {
        InitUploadRequest {
            filename: "lecture.mp4".to_string(),
            file_size,
            mime_type: "video/mp4".to_string(),
            title: "Lecture 1".to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn init_rejects_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());
        let err = manager.initialize_upload(init_request(0)).await;
        assert!(matches!(err, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn permuted_chunks_assemble_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, videos) = manager(dir.path());

        let original = b"0123456789"; // 10 bytes, chunk size 4 -> 3 chunks
        let (upload_id, video_id, total, chunk_size) = manager
            .initialize_upload(init_request(original.len() as u64))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(chunk_size, 4);

        for index in [2u32, 0, 1] {
            let start = (index as usize) * 4;
            let end = (start + 4).min(original.len());
            manager
                .upload_chunk(upload_id, index, &original[start..end])
                .await
                .unwrap();
        }

        let completed = manager.complete_upload(upload_id).await.unwrap();
        assert_eq!(completed, video_id);

        let video = videos.get(video_id);
        let assembled = std::fs::read(video.original_path.unwrap()).unwrap();
        assert_eq!(assembled, original);
    }

    #[tokio::test]
    async fn duplicate_chunk_counts_once() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());

        let (upload_id, _, _, _) = manager.initialize_upload(init_request(8)).await.unwrap();
        let first = manager.upload_chunk(upload_id, 0, b"aaaa").await.unwrap();
        let second = manager.upload_chunk(upload_id, 0, b"AAAA").await.unwrap();
        assert_eq!(first.received_count, 1);
        assert_eq!(second.received_count, 1);
    }

    #[tokio::test]
    async fn out_of_range_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());

        let (upload_id, _, total, _) = manager.initialize_upload(init_request(8)).await.unwrap();
        assert_eq!(total, 2);
        let err = manager.upload_chunk(upload_id, 2, b"zzzz").await;
        assert!(matches!(
            err,
            Err(AppError::IndexOutOfRange { index: 2, total: 2 })
        ));
    }

    #[tokio::test]
    async fn incomplete_completion_lists_missing_and_video_stays_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, videos) = manager(dir.path());

        let (upload_id, video_id, _, _) =
            manager.initialize_upload(init_request(12)).await.unwrap();
        manager.upload_chunk(upload_id, 0, b"aaaa").await.unwrap();
        manager.upload_chunk(upload_id, 2, b"cccc").await.unwrap();

        match manager.complete_upload(upload_id).await {
            Err(AppError::IncompleteUpload { missing }) => assert_eq!(missing, vec![1]),
            other => panic!("expected IncompleteUpload, got {:?}", other.map(|_| ())),
        }

        use vodforge_core::models::VideoStatus;
        assert_eq!(videos.get(video_id).status, VideoStatus::Pending);
    }

    #[tokio::test]
    async fn size_mismatch_is_corrupt_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());

        // Declared 8 bytes but send 7.
        let (upload_id, _, _, _) = manager.initialize_upload(init_request(8)).await.unwrap();
        manager.upload_chunk(upload_id, 0, b"aaaa").await.unwrap();
        manager.upload_chunk(upload_id, 1, b"bbb").await.unwrap();

        let err = manager.complete_upload(upload_id).await;
        assert!(matches!(
            err,
            Err(AppError::CorruptUpload {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[tokio::test]
    async fn resume_reports_missing_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());

        let (upload_id, _, _, _) = manager.initialize_upload(init_request(16)).await.unwrap();
        manager.upload_chunk(upload_id, 1, b"bbbb").await.unwrap();
        manager.upload_chunk(upload_id, 3, b"dddd").await.unwrap();

        let missing = manager.missing_chunks(upload_id).await.unwrap();
        assert_eq!(missing, vec![0, 2]);

        let progress = manager.get_progress(upload_id).await.unwrap();
        assert_eq!(progress.received_chunks, 2);
        assert_eq!(progress.total_chunks, 4);
        assert_eq!(progress.percent, 50.0);
    }

    #[tokio::test]
    async fn cancel_then_complete_is_upload_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path());

        let (upload_id, _, _, _) = manager.initialize_upload(init_request(12)).await.unwrap();
        manager.upload_chunk(upload_id, 0, b"aaaa").await.unwrap();
        manager.upload_chunk(upload_id, 1, b"bbbb").await.unwrap();

        manager.cancel_upload(upload_id).await.unwrap();

        let err = manager.complete_upload(upload_id).await;
        assert!(matches!(err, Err(AppError::UploadNotFound(_))));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\movies\\a.mp4"), "a.mp4");
        assert_eq!(sanitize_filename(".."), "upload.bin");
        assert_eq!(sanitize_filename("lecture.mp4"), "lecture.mp4");
    }
}
