//! Vodforge processing library
//!
//! The upload→transcode→publish pipeline: chunked upload sessions and
//! assembly, source resolution, ffmpeg orchestration with mapped progress,
//! and publishing of HLS artifacts to object storage.

pub mod chunk_store;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod reaper;
pub mod session;
pub mod source;
pub mod transcode;
pub mod upload;
pub mod video_state;

pub use chunk_store::ChunkStore;
pub use pipeline::VideoPipeline;
pub use progress::{ProgressTracker, Stage};
pub use publish::Publisher;
pub use reaper::SessionReaper;
pub use session::{InMemorySessionStore, SessionStore};
pub use source::{SourceResolver, VideoSource};
pub use transcode::{EncodeOptions, FfmpegTranscoder, MediaInfo, Transcoder};
pub use upload::{ChunkReceipt, InitUploadRequest, UploadManager, UploadProgress};
pub use video_state::VideoStateStore;
