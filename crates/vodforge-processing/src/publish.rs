//! Publishing of transcode artifacts to object storage.
//!
//! Upload order is the atomicity mechanism: the thumbnail and rendition
//! media go up first, playlists after the files they reference, and the
//! master playlist last. A player (or the status endpoint) that can fetch
//! `master.m3u8` is guaranteed every artifact it references is already in
//! place; a failed run leaves no master behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

use vodforge_core::constants::PLACEHOLDER_HOST;
use vodforge_core::models::QualityPreset;
use vodforge_core::{keys, AppError};
use vodforge_storage::Storage;

use crate::transcode::master_playlist;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const PLAYLIST_CACHE_CONTROL: &str = "no-cache";
const SEGMENT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

pub struct Publisher {
    storage: Arc<dyn Storage>,
    public_base_url: String,
}

impl Publisher {
    pub fn new(storage: Arc<dyn Storage>, public_base_url: impl Into<String>) -> Self {
        Self {
            storage,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Publish one video's HLS tree from `hls_dir`, which holds one
    /// subdirectory per rendition (`{label}/playlist.m3u8` + `segment_*.ts`).
    /// Returns the public URL of the master playlist.
    pub async fn publish_video(
        &self,
        video_id: Uuid,
        hls_dir: &Path,
        presets: &[QualityPreset],
        thumbnail: Option<&Path>,
    ) -> Result<String, AppError> {
        if let Some(thumb) = thumbnail {
            let data = fs::read(thumb)
                .await
                .map_err(|e| publish_failure("read thumbnail", &e))?;
            self.put(
                &keys::thumbnail_key(video_id),
                data,
                "image/jpeg",
                SEGMENT_CACHE_CONTROL,
            )
            .await?;
        }

        for preset in presets {
            self.upload_directory(
                &hls_dir.join(preset.label),
                &keys::rendition_prefix(video_id, preset.label),
            )
            .await?;
        }

        // Commit marker: the master goes up only after everything it
        // references is fetchable.
        let master = self.rewrite_host(&master_playlist(video_id, presets, PLACEHOLDER_HOST));
        let master_key = keys::master_playlist_key(video_id);
        self.put(
            &master_key,
            master.into_bytes(),
            PLAYLIST_CONTENT_TYPE,
            PLAYLIST_CACHE_CONTROL,
        )
        .await?;

        tracing::info!(
            video_id = %video_id,
            renditions = presets.len(),
            "Published HLS tree"
        );
        Ok(format!("{}/{}", self.public_base_url, master_key))
    }

    /// Upload every file under `local_dir` to `remote_prefix`, recursing into
    /// subdirectories. Content type and cache policy come from the file
    /// extension; playlists are host-rewritten and uploaded after the media
    /// files they reference.
    pub async fn upload_directory(
        &self,
        local_dir: &Path,
        remote_prefix: &str,
    ) -> Result<(), AppError> {
        let remote_prefix = remote_prefix.trim_end_matches('/');
        let mut pending: Vec<(PathBuf, String)> = vec![(local_dir.to_path_buf(), String::new())];
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| publish_failure(&format!("read dir {}", dir.display()), &e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| publish_failure("list dir", &e))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                let child_rel = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| publish_failure(&format!("stat {}", child_rel), &e))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), child_rel));
                } else {
                    files.push((entry.path(), child_rel));
                }
            }
        }

        // Playlists go last so nothing fetchable ever references a file that
        // is not yet uploaded.
        files.sort_by(|a, b| {
            let a_playlist = a.1.ends_with(".m3u8");
            let b_playlist = b.1.ends_with(".m3u8");
            a_playlist.cmp(&b_playlist).then_with(|| a.1.cmp(&b.1))
        });

        for (path, rel) in files {
            let key = format!("{}/{}", remote_prefix, rel);
            if rel.ends_with(".m3u8") {
                let playlist = fs::read_to_string(&path)
                    .await
                    .map_err(|e| publish_failure(&format!("read playlist {}", rel), &e))?;
                self.put(
                    &key,
                    self.rewrite_host(&playlist).into_bytes(),
                    PLAYLIST_CONTENT_TYPE,
                    PLAYLIST_CACHE_CONTROL,
                )
                .await?;
            } else {
                let data = fs::read(&path)
                    .await
                    .map_err(|e| publish_failure(&format!("read {}", rel), &e))?;
                let (content_type, cache_control) = media_headers(&rel);
                self.put(&key, data, content_type, cache_control).await?;
            }
        }
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), AppError> {
        self.storage
            .upload_with_key(key, data, content_type, cache_control)
            .await
            .map_err(|e| AppError::PublishFailure(format!("upload {}: {}", key, e)))
    }

    /// Substitute the public base URL for the internal host written by the
    /// transcoder.
    fn rewrite_host(&self, playlist: &str) -> String {
        playlist.replace(PLACEHOLDER_HOST, &self.public_base_url)
    }
}

fn publish_failure(action: &str, err: &dyn std::fmt::Display) -> AppError {
    AppError::PublishFailure(format!("{}: {}", action, err))
}

/// Headers for non-playlist artifacts, keyed by file extension.
fn media_headers(name: &str) -> (&'static str, &'static str) {
    let extension = name.rsplit('.').next().unwrap_or("");
    match extension {
        "ts" => ("video/MP2T", SEGMENT_CACHE_CONTROL),
        "mp4" | "m4s" => ("video/mp4", SEGMENT_CACHE_CONTROL),
        "jpg" | "jpeg" => ("image/jpeg", SEGMENT_CACHE_CONTROL),
        "png" => ("image/png", SEGMENT_CACHE_CONTROL),
        "vtt" => ("text/vtt", PLAYLIST_CACHE_CONTROL),
        _ => ("application/octet-stream", SEGMENT_CACHE_CONTROL),
    }
}
