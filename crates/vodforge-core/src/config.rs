//! Configuration module
//!
//! Environment-driven configuration for the API server, database, storage
//! backends, the upload session layer, the transcoder, and publishing.

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_SEGMENT_DURATION_SECS, DEFAULT_SESSION_TTL_SECS,
};
use crate::storage_types::StorageBackend;

const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 4 * 1024 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_TRANSCODES: usize = 2;
const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_REAP_INTERVAL_SECS: u64 = 300;

/// HTTP server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Database connection configuration.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

/// Object storage configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
}

/// Upload session layer configuration.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Directory holding in-flight chunk fragments and assembled sources.
    pub upload_dir: String,
    /// Chunk size handed to clients at init.
    pub chunk_size_bytes: u64,
    pub max_file_size_bytes: u64,
    pub session_ttl_secs: u64,
    /// Interval between reaper sweeps; 0 disables the reaper.
    pub reap_interval_secs: u64,
}

/// Transcoder configuration.
#[derive(Clone, Debug)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub segment_duration_secs: u64,
    /// Quality labels encoded per job, e.g. ["360p", "480p", "720p"].
    pub qualities: Vec<String>,
    pub generate_thumbnail: bool,
    pub max_concurrent_jobs: usize,
    /// Timeout for a single ffmpeg/ffprobe invocation.
    pub timeout_secs: u64,
}

/// Publishing configuration.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// Externally reachable base URL substituted into playlists, e.g.
    /// "https://cdn.example.com" or "http://localhost:9000/videos-bucket".
    pub public_base_url: String,
}

/// Full service configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub transcode: TranscodeConfig,
    pub publish: PublishConfig,
}

impl Config {
    /// Load configuration from environment variables, applying defaults for
    /// everything except `DATABASE_URL` and `PUBLIC_BASE_URL`.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL not set".to_string())?;
        let public_base_url =
            env::var("PUBLIC_BASE_URL").map_err(|_| "PUBLIC_BASE_URL not set".to_string())?;

        let backend = env_or("STORAGE_BACKEND", "s3");
        let backend = StorageBackend::from_str(&backend)?;

        let config = Config {
            server: ServerConfig {
                port: parse_env("SERVER_PORT", DEFAULT_SERVER_PORT),
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_default()
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
                timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", DEFAULT_DB_TIMEOUT_SECS),
            },
            storage: StorageConfig {
                backend,
                s3_bucket: env::var("S3_BUCKET").ok(),
                s3_region: env::var("S3_REGION")
                    .or_else(|_| env::var("AWS_REGION"))
                    .ok(),
                s3_endpoint: env::var("S3_ENDPOINT").ok(),
                local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            },
            upload: UploadConfig {
                upload_dir: env_or("UPLOAD_DIR", "/tmp/vodforge/uploads"),
                chunk_size_bytes: parse_env("UPLOAD_CHUNK_SIZE_BYTES", DEFAULT_CHUNK_SIZE_BYTES),
                max_file_size_bytes: parse_env("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE_BYTES),
                session_ttl_secs: parse_env("UPLOAD_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
                reap_interval_secs: parse_env(
                    "UPLOAD_REAP_INTERVAL_SECS",
                    DEFAULT_REAP_INTERVAL_SECS,
                ),
            },
            transcode: TranscodeConfig {
                ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
                ffprobe_path: env_or("FFPROBE_PATH", "ffprobe"),
                segment_duration_secs: parse_env(
                    "HLS_SEGMENT_DURATION",
                    DEFAULT_SEGMENT_DURATION_SECS,
                ),
                qualities: env_or("HLS_QUALITIES", "360p,480p,720p")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                generate_thumbnail: parse_env("GENERATE_THUMBNAIL", true),
                max_concurrent_jobs: parse_env(
                    "MAX_CONCURRENT_TRANSCODES",
                    DEFAULT_MAX_CONCURRENT_TRANSCODES,
                ),
                timeout_secs: parse_env("TRANSCODE_TIMEOUT_SECS", DEFAULT_TRANSCODE_TIMEOUT_SECS),
            },
            publish: PublishConfig {
                public_base_url: public_base_url.trim_end_matches('/').to_string(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.upload.chunk_size_bytes == 0 {
            return Err("UPLOAD_CHUNK_SIZE_BYTES must be greater than 0".to_string());
        }
        if self.transcode.qualities.is_empty() {
            return Err("HLS_QUALITIES must name at least one quality".to_string());
        }
        if self.transcode.max_concurrent_jobs == 0 {
            return Err("MAX_CONCURRENT_TRANSCODES must be greater than 0".to_string());
        }
        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err("S3_BUCKET not configured for s3 backend".to_string());
                }
                if self.storage.s3_region.is_none() {
                    return Err("S3_REGION or AWS_REGION not configured for s3 backend".to_string());
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err("LOCAL_STORAGE_PATH not configured for local backend".to_string());
                }
            }
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
