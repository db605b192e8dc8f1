//! Transcoding seam.
//!
//! [`Transcoder`] is what the pipeline drives: probe, thumbnail, and one HLS
//! rendition per call with a progress callback. The ffmpeg implementation
//! lives in [`ffmpeg`]; tests drive the pipeline with a fake.
//!
//! Playlists are written against a fixed internal host and rewritten to the
//! public base URL at publish time, so artifacts on disk never embed a
//! deployment-specific hostname.

pub mod ffmpeg;
mod playlist;

use async_trait::async_trait;
use std::path::Path;
use uuid::Uuid;

use vodforge_core::models::QualityPreset;
use vodforge_core::AppError;

pub use ffmpeg::FfmpegTranscoder;
pub use playlist::master_playlist;

/// Probed facts about a source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

/// Per-run parameters shared by every rendition encode.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub video_id: Uuid,
    pub segment_duration_secs: u64,
    /// Host prefix written into playlists; replaced at publish time.
    pub base_url: String,
}

impl EncodeOptions {
    /// Absolute URL prefix under which this rendition's segments will live.
    pub fn segment_base_url(&self, quality: &str) -> String {
        format!(
            "{}/{}/",
            self.base_url,
            vodforge_core::keys::rendition_prefix(self.video_id, quality)
        )
    }
}

/// Drives the external encoder. One rendition per call so the pipeline owns
/// ordering, progress slicing, and fail-fast.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read duration and dimensions from the source. Failure means the file
    /// is not decodable media.
    async fn probe(&self, source: &Path) -> Result<MediaInfo, AppError>;

    /// Extract a single representative frame as a JPEG at `dest`.
    async fn extract_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
        info: &MediaInfo,
    ) -> Result<(), AppError>;

    /// Encode one rendition into `output_dir` as `playlist.m3u8` plus
    /// `segment_*.ts`, reporting completion fractions in 0.0–1.0.
    async fn encode_rendition(
        &self,
        source: &Path,
        preset: &QualityPreset,
        output_dir: &Path,
        options: &EncodeOptions,
        info: &MediaInfo,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), AppError>;
}
