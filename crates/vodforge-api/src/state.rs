//! Shared application state.

use std::sync::Arc;

use vodforge_core::Config;
use vodforge_db::VideoRepository;
use vodforge_processing::{UploadManager, VideoPipeline};
use vodforge_storage::Storage;

pub struct AppState {
    pub config: Config,
    pub videos: VideoRepository,
    pub storage: Arc<dyn Storage>,
    pub uploads: UploadManager,
    pub pipeline: Arc<VideoPipeline>,
}
