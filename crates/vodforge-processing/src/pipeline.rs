//! Per-video processing orchestration.
//!
//! One detached task per video: resolve source → probe → thumbnail →
//! renditions (sequential) → publish → ready. A semaphore bounds concurrent
//! jobs across the process; excess jobs queue on acquire. The first failing
//! stage aborts the run and lands on the video row as `status=error` with
//! the stage's diagnostic.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use uuid::Uuid;

use vodforge_core::models::{QualityPreset, Video};
use vodforge_core::{AppError, TranscodeConfig};
use vodforge_storage::Storage;

use crate::progress::{ProgressTracker, Stage};
use crate::publish::Publisher;
use crate::source::{retain_source, SourceResolver, VideoSource};
use crate::transcode::{EncodeOptions, Transcoder};
use crate::video_state::VideoStateStore;

pub struct VideoPipeline {
    videos: Arc<dyn VideoStateStore>,
    storage: Arc<dyn Storage>,
    transcoder: Arc<dyn Transcoder>,
    resolver: SourceResolver,
    publisher: Publisher,
    jobs: Semaphore,
    presets: Vec<QualityPreset>,
    config: TranscodeConfig,
    scratch_root: PathBuf,
}

impl VideoPipeline {
    pub fn new(
        videos: Arc<dyn VideoStateStore>,
        storage: Arc<dyn Storage>,
        transcoder: Arc<dyn Transcoder>,
        config: TranscodeConfig,
        public_base_url: &str,
        scratch_root: impl Into<PathBuf>,
    ) -> Result<Arc<Self>, AppError> {
        let presets =
            QualityPreset::resolve(&config.qualities).map_err(AppError::InvalidRequest)?;
        Ok(Arc::new(Self {
            videos,
            storage: storage.clone(),
            transcoder,
            resolver: SourceResolver::new(storage.clone()),
            publisher: Publisher::new(storage, public_base_url),
            jobs: Semaphore::new(config.max_concurrent_jobs),
            presets,
            config,
            scratch_root: scratch_root.into(),
        }))
    }

    /// Delete leftovers under the scratch root from runs a crash cut short.
    /// Live runs hold their scratch in a `TempDir` that cleans up on exit, so
    /// anything found here before jobs start is stale. Call once at startup.
    pub async fn clear_stale_scratch(&self) -> Result<(), AppError> {
        let mut entries = match fs::read_dir(&self.scratch_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let removed = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match removed {
                Ok(()) => tracing::info!(path = %path.display(), "Removed stale scratch entry"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale scratch entry")
                }
            }
        }
        Ok(())
    }

    /// Detach a processing run for a video already marked `processing`.
    pub fn spawn(self: &Arc<Self>, video_id: Uuid) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.process(video_id).await;
        });
    }

    /// Run the full pipeline for one video, recording the outcome on the
    /// video row. Never returns an error: failures land in `status=error`.
    pub async fn process(&self, video_id: Uuid) {
        let _permit = match self.jobs.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        tracing::info!(video_id = %video_id, "Processing started");
        match self.run(video_id).await {
            Ok(master_url) => {
                tracing::info!(video_id = %video_id, master_url = %master_url, "Processing complete");
            }
            Err(e) => {
                tracing::error!(video_id = %video_id, error = %e, "Processing failed");
                if let Err(mark_err) = self
                    .videos
                    .mark_error(video_id, &e.pipeline_message())
                    .await
                {
                    tracing::error!(video_id = %video_id, error = %mark_err, "Failed to record error state");
                }
            }
        }
    }

    async fn run(&self, video_id: Uuid) -> Result<String, AppError> {
        let video = self
            .videos
            .get_video(video_id)
            .await?
            .ok_or(AppError::VideoNotFound(video_id))?;

        fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::tempdir_in(&self.scratch_root)
            .map_err(|e| AppError::Internal(format!("scratch dir: {}", e)))?;

        let tracker = Arc::new(ProgressTracker::new(video_id, self.videos.clone()));
        let result = self.run_stages(&video, scratch.path(), &tracker).await;

        // Flush queued progress writes before the final state transition so a
        // late percentage can never land after ready/error.
        match Arc::try_unwrap(tracker) {
            Ok(tracker) => tracker.finish().await,
            Err(_) => tracing::warn!(video_id = %video_id, "Progress tracker still shared at teardown"),
        }

        let (master_url, duration_seconds) = result?;
        self.videos
            .record_renditions(
                video_id,
                &self
                    .presets
                    .iter()
                    .map(|p| {
                        (
                            p.clone(),
                            vodforge_core::keys::variant_playlist_key(video_id, p.label),
                        )
                    })
                    .collect::<Vec<_>>(),
            )
            .await?;
        self.videos
            .mark_ready(video_id, &master_url, duration_seconds)
            .await?;
        Ok(master_url)
    }

    async fn run_stages(
        &self,
        video: &Video,
        scratch: &std::path::Path,
        tracker: &Arc<ProgressTracker>,
    ) -> Result<(String, f64), AppError> {
        let source = self.resolver.resolve(video).await?;
        let source_path = self.resolver.materialize(&source, scratch).await?;

        let info = self.transcoder.probe(&source_path).await?;
        tracker.complete(Stage::Probe);

        // Retain the original alongside the HLS tree so a reprocess works
        // after the local copy is cleaned up.
        if matches!(source, VideoSource::LocalFile(_)) {
            retain_source(
                self.storage.as_ref(),
                video.id,
                &video.original_filename,
                &video.mime_type,
                &source_path,
            )
            .await?;
        }

        let thumbnail_path = if self.config.generate_thumbnail {
            let path = scratch.join("thumbnail.jpg");
            self.transcoder
                .extract_thumbnail(&source_path, &path, &info)
                .await?;
            Some(path)
        } else {
            None
        };
        tracker.complete(Stage::Thumbnail);

        let options = EncodeOptions {
            video_id: video.id,
            segment_duration_secs: self.config.segment_duration_secs,
            base_url: vodforge_core::constants::PLACEHOLDER_HOST.to_string(),
        };
        let hls_dir = scratch.join("hls");
        let count = self.presets.len();
        for (index, preset) in self.presets.iter().enumerate() {
            let stage = Stage::Rendition { index, count };
            let callback = tracker.stage_callback(stage);
            self.transcoder
                .encode_rendition(
                    &source_path,
                    preset,
                    &hls_dir.join(preset.label),
                    &options,
                    &info,
                    &callback,
                )
                .await?;
            tracker.complete(stage);
        }

        tracker.report(Stage::Publish, 0.0);
        let master_url = self
            .publisher
            .publish_video(video.id, &hls_dir, &self.presets, thumbnail_path.as_deref())
            .await?;
        tracker.complete(Stage::Publish);

        Ok((master_url, info.duration_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_store::ChunkStore;
    use crate::session::InMemorySessionStore;
    use crate::upload::{InitUploadRequest, UploadManager};
    use crate::video_state::tests_support::MemoryVideoStore;
    use async_trait::async_trait;
    use std::path::Path;
    use vodforge_core::constants::PLACEHOLDER_HOST;
    use vodforge_core::models::VideoStatus;
    use vodforge_core::{keys, UploadConfig};
    use vodforge_storage::LocalStorage;

    /// Transcoder that fabricates a plausible HLS tree without ffmpeg.
    struct FakeTranscoder {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn probe(&self, source: &Path) -> Result<crate::transcode::MediaInfo, AppError> {
            let size = tokio::fs::metadata(source).await?.len();
            if size == 0 {
                return Err(AppError::TranscodeFailure {
                    stage: "probe".to_string(),
                    detail: "empty source".to_string(),
                });
            }
            Ok(crate::transcode::MediaInfo {
                duration_seconds: 60.0,
                width: 1920,
                height: 1080,
            })
        }

        async fn extract_thumbnail(
            &self,
            _source: &Path,
            dest: &Path,
            _info: &crate::transcode::MediaInfo,
        ) -> Result<(), AppError> {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(dest, b"jpeg").await?;
            Ok(())
        }

        async fn encode_rendition(
            &self,
            _source: &Path,
            preset: &QualityPreset,
            output_dir: &Path,
            options: &EncodeOptions,
            _info: &crate::transcode::MediaInfo,
            progress: &(dyn Fn(f64) + Send + Sync),
        ) -> Result<(), AppError> {
            if self.fail_on == Some(preset.label) {
                return Err(AppError::TranscodeFailure {
                    stage: format!("encode:{}", preset.label),
                    detail: "injected encoder failure".to_string(),
                });
            }
            tokio::fs::create_dir_all(output_dir).await?;
            progress(0.5);
            let base = options.segment_base_url(preset.label);
            let mut playlist = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:6\n");
            for i in 0..2 {
                tokio::fs::write(
                    output_dir.join(format!("segment_{:04}.ts", i)),
                    b"segment-bytes",
                )
                .await?;
                playlist.push_str(&format!("#EXTINF:6.0,\n{}segment_{:04}.ts\n", base, i));
            }
            playlist.push_str("#EXT-X-ENDLIST\n");
            tokio::fs::write(output_dir.join("playlist.m3u8"), playlist).await?;
            progress(1.0);
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        videos: Arc<MemoryVideoStore>,
        storage: Arc<LocalStorage>,
        uploads: UploadManager,
        pipeline: Arc<VideoPipeline>,
    }

    async fn harness(fail_on: Option<&'static str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let videos = Arc::new(MemoryVideoStore::new());
        let storage = Arc::new(LocalStorage::new(dir.path().join("objects")).await.unwrap());

        let upload_dir = dir.path().join("uploads");
        let uploads = UploadManager::new(
            Arc::new(InMemorySessionStore::new()),
            ChunkStore::new(upload_dir.join("chunks")),
            videos.clone(),
            UploadConfig {
                upload_dir: upload_dir.to_string_lossy().to_string(),
                chunk_size_bytes: 5 * 1024 * 1024,
                max_file_size_bytes: 64 * 1024 * 1024,
                session_ttl_secs: 3600,
                reap_interval_secs: 0,
            },
        );

        let pipeline = VideoPipeline::new(
            videos.clone(),
            storage.clone(),
            Arc::new(FakeTranscoder { fail_on }),
            TranscodeConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                segment_duration_secs: 6,
                qualities: vec!["360p".to_string(), "480p".to_string(), "720p".to_string()],
                generate_thumbnail: true,
                max_concurrent_jobs: 2,
                timeout_secs: 60,
            },
            "http://localhost:9000/videos-bucket",
            upload_dir.join("scratch"),
        )
        .unwrap();

        Harness {
            _dir: dir,
            videos,
            storage,
            uploads,
            pipeline,
        }
    }

    /// Upload a 12 MB file in 5 MiB / 5 MiB / 2 MiB chunks and complete it.
    async fn upload_12mb(h: &Harness) -> Uuid {
        let total: usize = 12 * 1024 * 1024;
        let payload = vec![0x5au8; total];
        let (upload_id, video_id, chunks, chunk_size) = h
            .uploads
            .initialize_upload(InitUploadRequest {
                filename: "lecture.mp4".to_string(),
                file_size: total as u64,
                mime_type: "video/mp4".to_string(),
                title: "Lecture 1".to_string(),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(chunks, 3);

        for index in [1u32, 2, 0] {
            let start = index as usize * chunk_size as usize;
            let end = (start + chunk_size as usize).min(total);
            h.uploads
                .upload_chunk(upload_id, index, &payload[start..end])
                .await
                .unwrap();
        }
        let completed = h.uploads.complete_upload(upload_id).await.unwrap();
        assert_eq!(completed, video_id);
        video_id
    }

    #[tokio::test]
    async fn full_run_publishes_tree_and_marks_ready() {
        let h = harness(None).await;
        let video_id = upload_12mb(&h).await;
        assert_eq!(h.videos.get(video_id).status, VideoStatus::Processing);

        h.pipeline.process(video_id).await;

        let video = h.videos.get(video_id);
        assert_eq!(video.status, VideoStatus::Ready);
        assert_eq!(video.processing_progress, 100);
        assert_eq!(video.duration_seconds, Some(60.0));
        let master_url = video.hls_playlist_url.unwrap();
        assert_eq!(
            master_url,
            format!(
                "http://localhost:9000/videos-bucket/videos/hls/{}/master.m3u8",
                video_id
            )
        );

        let master = String::from_utf8(
            h.storage
                .download(&keys::master_playlist_key(video_id))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            master
                .lines()
                .filter(|l| l.starts_with("#EXT-X-STREAM-INF:"))
                .count(),
            3
        );
        assert!(!master.contains(PLACEHOLDER_HOST));

        for label in ["360p", "480p", "720p"] {
            let variant = String::from_utf8(
                h.storage
                    .download(&keys::variant_playlist_key(video_id, label))
                    .await
                    .unwrap(),
            )
            .unwrap();
            assert!(!variant.contains(PLACEHOLDER_HOST));
        }
        assert!(h
            .storage
            .exists(&keys::thumbnail_key(video_id))
            .await
            .unwrap());
        assert!(h
            .storage
            .exists(&keys::source_key(video_id, "lecture.mp4"))
            .await
            .unwrap());

        let renditions = h.videos.renditions_for(video_id);
        assert_eq!(renditions.len(), 3);
        assert_eq!(
            renditions[2].1,
            keys::variant_playlist_key(video_id, "720p")
        );
    }

    #[tokio::test]
    async fn rendition_failure_marks_error_without_master() {
        let h = harness(Some("480p")).await;
        let video_id = upload_12mb(&h).await;

        h.pipeline.process(video_id).await;

        let video = h.videos.get(video_id);
        assert_eq!(video.status, VideoStatus::Error);
        let message = video.error_message.unwrap();
        assert!(message.contains("encode:480p"));

        assert!(!h
            .storage
            .exists(&keys::master_playlist_key(video_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reprocess_works_from_retained_source() {
        let h = harness(None).await;
        let video_id = upload_12mb(&h).await;
        h.pipeline.process(video_id).await;
        assert_eq!(h.videos.get(video_id).status, VideoStatus::Ready);

        // Local assembled copy disappears (disk cleanup); the retained object
        // must carry the reprocess.
        let video = h.videos.get(video_id);
        std::fs::remove_file(video.original_path.unwrap()).unwrap();

        h.videos.mark_reprocessing(video_id).await.unwrap();
        h.pipeline.process(video_id).await;

        let video = h.videos.get(video_id);
        assert_eq!(video.status, VideoStatus::Ready);
        assert_eq!(video.processing_progress, 100);
    }

    #[tokio::test]
    async fn reprocess_rejects_video_with_upload_in_flight() {
        let h = harness(None).await;
        let (_, video_id, _, _) = h
            .uploads
            .initialize_upload(InitUploadRequest {
                filename: "partial.mp4".to_string(),
                file_size: 1024,
                mime_type: "video/mp4".to_string(),
                title: "Partial".to_string(),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(h.videos.get(video_id).status, VideoStatus::Pending);

        // No chunks have arrived yet; a reprocess must not grab the video.
        let err = h.videos.mark_reprocessing(video_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(h.videos.get(video_id).status, VideoStatus::Pending);
    }

    #[tokio::test]
    async fn stale_scratch_is_cleared_at_startup() {
        let h = harness(None).await;
        let scratch_root = h._dir.path().join("uploads").join("scratch");
        let leftover = scratch_root.join("tmp_interrupted_run");
        tokio::fs::create_dir_all(&leftover).await.unwrap();
        tokio::fs::write(leftover.join("segment_0000.ts"), b"half-written")
            .await
            .unwrap();

        h.pipeline.clear_stale_scratch().await.unwrap();

        assert!(!leftover.exists());
        assert!(scratch_root.exists());
    }

    #[tokio::test]
    async fn missing_source_everywhere_is_recorded_error() {
        let h = harness(None).await;
        let video = h
            .videos
            .create_video(
                "Orphan".to_string(),
                "orphan.mp4".to_string(),
                "video/mp4".to_string(),
                1,
                None,
            )
            .await
            .unwrap();
        h.videos.mark_processing(video.id).await.unwrap();

        h.pipeline.process(video.id).await;

        let video = h.videos.get(video.id);
        assert_eq!(video.status, VideoStatus::Error);
        assert!(video.error_message.unwrap().contains("Source not found"));
    }
}
