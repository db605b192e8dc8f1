//! Domain models.

pub mod quality;
pub mod rendition;
pub mod upload_session;
pub mod video;

pub use quality::QualityPreset;
pub use rendition::Rendition;
pub use upload_session::UploadSession;
pub use video::{Video, VideoStatus};
