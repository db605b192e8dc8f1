//! ffmpeg/ffprobe-backed [`Transcoder`].
//!
//! Each operation is one external process invocation with a hard timeout.
//! Encode progress is read from `-progress pipe:1` key/value output on
//! stdout; stderr is collected concurrently so a failure can carry the
//! encoder's own diagnostics.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use vodforge_core::models::QualityPreset;
use vodforge_core::{AppError, TranscodeConfig};

use super::{EncodeOptions, MediaInfo, Transcoder};

/// Max bytes of stderr kept for the failure message.
const STDERR_EXCERPT_BYTES: usize = 2048;

pub struct FfmpegTranscoder {
    config: TranscodeConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Run a short-lived invocation to completion, capturing both pipes.
    async fn run_captured(
        &self,
        program: &str,
        args: &[String],
        stage: &str,
    ) -> Result<Vec<u8>, AppError> {
        let output = tokio::time::timeout(
            self.timeout(),
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| timeout_failure(stage, self.config.timeout_secs))?
        .map_err(|e| spawn_failure(stage, program, &e))?;

        if !output.status.success() {
            return Err(AppError::TranscodeFailure {
                stage: stage.to_string(),
                detail: format!(
                    "{} exited with {}: {}",
                    program,
                    output.status,
                    excerpt(&output.stderr)
                ),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, source: &Path) -> Result<MediaInfo, AppError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            source.to_string_lossy().to_string(),
        ];
        let stdout = self
            .run_captured(&self.config.ffprobe_path, &args, "probe")
            .await?;
        parse_probe_output(&stdout)
    }

    async fn extract_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
        info: &MediaInfo,
    ) -> Result<(), AppError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Grab a frame 10% in so black lead-in frames are skipped.
        let seek = (info.duration_seconds * 0.1).max(0.0);
        let args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", seek),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            dest.to_string_lossy().to_string(),
        ];
        self.run_captured(&self.config.ffmpeg_path, &args, "thumbnail")
            .await?;
        Ok(())
    }

    async fn encode_rendition(
        &self,
        source: &Path,
        preset: &QualityPreset,
        output_dir: &Path,
        options: &EncodeOptions,
        info: &MediaInfo,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), AppError> {
        fs::create_dir_all(output_dir).await?;
        let stage = format!("encode:{}", preset.label);

        let playlist_path = output_dir.join("playlist.m3u8");
        let segment_pattern = output_dir.join("segment_%04d.ts");
        let scale = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = preset.width,
            h = preset.height
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-vf", &scale])
            .args(["-c:v", "libx264", "-preset", "veryfast"])
            .args(["-b:v", &preset.bitrate.to_string()])
            .args(["-maxrate", &preset.bitrate.to_string()])
            .args(["-bufsize", &(preset.bitrate * 2).to_string()])
            .args(["-c:a", "aac", "-b:a", "128k", "-ac", "2"])
            .args(["-hls_time", &options.segment_duration_secs.to_string()])
            .args(["-hls_playlist_type", "vod"])
            .args(["-hls_base_url", &options.segment_base_url(preset.label)])
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .args(["-progress", "pipe:1", "-nostats"])
            .arg(&playlist_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_failure(&stage, &self.config.ffmpeg_path, &e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AppError::Internal("ffmpeg stdout pipe not captured".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            AppError::Internal("ffmpeg stderr pipe not captured".to_string())
        })?;
        let stderr_task = tokio::spawn(collect_excerpt(stderr));

        let duration = info.duration_seconds.max(f64::EPSILON);
        let wait = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(seconds) = parse_out_time_secs(&line) {
                    progress((seconds / duration).clamp(0.0, 1.0));
                }
            }
            child.wait().await
        };

        let status = match tokio::time::timeout(self.timeout(), wait).await {
            Ok(result) => result.map_err(|e| AppError::TranscodeFailure {
                stage: stage.clone(),
                detail: format!("ffmpeg io error: {}", e),
            })?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(timeout_failure(&stage, self.config.timeout_secs));
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(AppError::TranscodeFailure {
                stage,
                detail: format!("ffmpeg exited with {}: {}", status, stderr_tail),
            });
        }

        progress(1.0);
        Ok(())
    }
}

fn spawn_failure(stage: &str, program: &str, err: &std::io::Error) -> AppError {
    AppError::TranscodeFailure {
        stage: stage.to_string(),
        detail: format!("failed to spawn {}: {}", program, err),
    }
}

fn timeout_failure(stage: &str, timeout_secs: u64) -> AppError {
    AppError::TranscodeFailure {
        stage: stage.to_string(),
        detail: format!("timed out after {}s", timeout_secs),
    }
}

/// Tail of stderr, bounded so failure messages stay loggable.
fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT_BYTES {
        return text.to_string();
    }
    let start = text.len() - STDERR_EXCERPT_BYTES;
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= start)
        .unwrap_or(0);
    format!("...{}", &text[start..])
}

async fn collect_excerpt(reader: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    excerpt(&buf)
}

/// Seconds of media encoded so far, from one `-progress` key/value line.
/// ffmpeg reports `out_time_ms` in microseconds.
fn parse_out_time_secs(line: &str) -> Option<f64> {
    let value = line.strip_prefix("out_time_ms=")?;
    let micros: i64 = value.trim().parse().ok()?;
    Some((micros.max(0) as f64) / 1_000_000.0)
}

/// Extract duration and dimensions from ffprobe's JSON output.
fn parse_probe_output(stdout: &[u8]) -> Result<MediaInfo, AppError> {
    let parsed: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| AppError::TranscodeFailure {
            stage: "probe".to_string(),
            detail: format!("unparseable ffprobe output: {}", e),
        })?;

    let duration_seconds = parsed["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| AppError::TranscodeFailure {
            stage: "probe".to_string(),
            detail: "source has no duration".to_string(),
        })?;

    let video_stream = parsed["streams"]
        .as_array()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s["codec_type"].as_str() == Some("video"))
        })
        .ok_or_else(|| AppError::TranscodeFailure {
            stage: "probe".to_string(),
            detail: "source has no video stream".to_string(),
        })?;

    let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
    let height = video_stream["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(AppError::TranscodeFailure {
            stage: "probe".to_string(),
            detail: "video stream has no dimensions".to_string(),
        });
    }

    Ok(MediaInfo {
        duration_seconds,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_json() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "62.417000", "size": "12582912"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration_seconds - 62.417).abs() < 1e-9);
    }

    #[test]
    fn probe_without_video_stream_fails() {
        let json = br#"{
            "streams": [{"codec_type": "audio"}],
            "format": {"duration": "10.0"}
        }"#;
        let err = parse_probe_output(json);
        assert!(matches!(
            err,
            Err(AppError::TranscodeFailure { ref stage, .. }) if stage == "probe"
        ));
    }

    #[test]
    fn probe_without_duration_fails() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360}],
            "format": {}
        }"#;
        assert!(parse_probe_output(json).is_err());
    }

    #[test]
    fn out_time_line_parses_to_seconds() {
        assert_eq!(parse_out_time_secs("out_time_ms=31250000"), Some(31.25));
        assert_eq!(parse_out_time_secs("out_time_ms=N/A"), None);
        assert_eq!(parse_out_time_secs("frame=42"), None);
        // ffmpeg emits -9223372036854775808 before the first timestamp.
        assert_eq!(
            parse_out_time_secs("out_time_ms=-9223372036854775808"),
            Some(0.0)
        );
    }

    #[test]
    fn excerpt_keeps_tail_of_long_output() {
        let long = "x".repeat(5000) + "tail marker";
        let e = excerpt(long.as_bytes());
        assert!(e.starts_with("..."));
        assert!(e.ends_with("tail marker"));
        assert!(e.len() <= STDERR_EXCERPT_BYTES + 3);
    }
}
