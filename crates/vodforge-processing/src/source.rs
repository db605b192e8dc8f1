//! Source resolution for transcode runs.
//!
//! A first run reads the assembled upload from local disk; a reprocess after
//! the local copy is gone falls back to the retained object under
//! `videos/sources/{video_id}/`. Either way the transcoder gets a local path.

use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use vodforge_core::models::Video;
use vodforge_core::{keys, AppError};
use vodforge_storage::Storage;

/// Where the bytes for a transcode run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Assembled upload still present on local disk.
    LocalFile(PathBuf),
    /// Retained original in object storage.
    ObjectStore(String),
}

pub struct SourceResolver {
    storage: Arc<dyn Storage>,
}

impl SourceResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Locate the source bytes for a video, preferring the local file.
    pub async fn resolve(&self, video: &Video) -> Result<VideoSource, AppError> {
        if let Some(path) = &video.original_path {
            let path = PathBuf::from(path);
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(VideoSource::LocalFile(path));
            }
        }

        let key = keys::source_key(video.id, &video.original_filename);
        if self.storage.exists(&key).await? {
            return Ok(VideoSource::ObjectStore(key));
        }

        Err(AppError::SourceNotFound(video.id))
    }

    /// Turn a resolved source into a local path the transcoder can read,
    /// downloading into `scratch_dir` when the source is remote.
    pub async fn materialize(
        &self,
        source: &VideoSource,
        scratch_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        match source {
            VideoSource::LocalFile(path) => Ok(path.clone()),
            VideoSource::ObjectStore(key) => {
                let filename = key.rsplit('/').next().unwrap_or("source.bin");
                let dest = scratch_dir.join(filename);

                let mut stream = self.storage.download_stream(key).await?;
                let mut file = fs::File::create(&dest).await?;
                while let Some(chunk) = stream.try_next().await.map_err(AppError::from)? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;

                tracing::debug!(key = %key, dest = %dest.display(), "Source downloaded from object storage");
                Ok(dest)
            }
        }
    }
}

/// Keep the original upload available for reprocessing after the local copy
/// is cleaned up.
pub async fn retain_source(
    storage: &dyn Storage,
    video_id: Uuid,
    filename: &str,
    mime_type: &str,
    local_path: &Path,
) -> Result<(), AppError> {
    let key = keys::source_key(video_id, filename);
    if storage.exists(&key).await? {
        return Ok(());
    }
    let data = fs::read(local_path).await?;
    storage
        .upload_with_key(&key, data, mime_type, "private, max-age=0")
        .await?;
    Ok(())
}
