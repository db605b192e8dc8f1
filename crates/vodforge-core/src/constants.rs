//! Shared constants.

/// Placeholder host written into playlists by the transcoder. The publisher
/// replaces it with the deployment's public base URL before upload; it must
/// never appear in a published manifest.
pub const PLACEHOLDER_HOST: &str = "https://vodforge.internal";

/// Fixed HLS segment duration in seconds.
pub const DEFAULT_SEGMENT_DURATION_SECS: u64 = 6;

/// Default chunk size handed to clients at upload init (5 MiB).
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Default TTL for an upload session before the reaper removes it.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Upper bound on chunks per session; forces clients to pick a sane chunk size.
pub const MAX_CHUNK_COUNT: u32 = 10_000;
