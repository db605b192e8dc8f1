//! Pipeline progress mapping and persistence.
//!
//! Each stage of a run owns a fixed slice of the 0–100 scale: probe 0–10,
//! thumbnail 10–20, renditions split 20–90 evenly, publish 90–100. Reported
//! values are clamped into the stage's slice and the overall percentage never
//! moves backward, so a poller sees a monotone climb regardless of how the
//! underlying encoder reports.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::video_state::VideoStateStore;

/// A slice of the overall progress scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Thumbnail,
    /// Rendition `index` of `count` in the ladder.
    Rendition { index: usize, count: usize },
    Publish,
}

impl Stage {
    /// The `[start, end]` percentage range this stage owns.
    pub fn range(self) -> (f64, f64) {
        match self {
            Stage::Probe => (0.0, 10.0),
            Stage::Thumbnail => (10.0, 20.0),
            Stage::Rendition { index, count } => {
                let count = count.max(1);
                let index = index.min(count - 1);
                let span = 70.0 / count as f64;
                // End derived from index + 1, not start + span, so the last
                // rendition ends at exactly 90.0 despite rounding in span.
                (
                    20.0 + span * index as f64,
                    20.0 + span * (index + 1) as f64,
                )
            }
            Stage::Publish => (90.0, 100.0),
        }
    }

    /// Map a 0.0–1.0 fraction of this stage onto the overall scale.
    pub fn map(self, fraction: f64) -> i32 {
        let (start, end) = self.range();
        let fraction = fraction.clamp(0.0, 1.0);
        (start + (end - start) * fraction).round() as i32
    }
}

/// Tracks one video's progress through the pipeline, persisting the mapped
/// percentage through the state store from a background task so encoder
/// callbacks never block on the database.
pub struct ProgressTracker {
    video_id: Uuid,
    current: Arc<AtomicI32>,
    sender: mpsc::UnboundedSender<i32>,
    persister: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn new(video_id: Uuid, videos: Arc<dyn VideoStateStore>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<i32>();
        let persister = tokio::spawn(async move {
            while let Some(percent) = receiver.recv().await {
                if let Err(e) = videos.update_progress(video_id, percent).await {
                    tracing::warn!(video_id = %video_id, error = %e, "Failed to persist progress");
                }
            }
        });

        Self {
            video_id,
            current: Arc::new(AtomicI32::new(0)),
            sender,
            persister,
        }
    }

    /// Report a fraction (0.0–1.0) of the given stage. Values that would move
    /// the overall percentage backward are dropped.
    pub fn report(&self, stage: Stage, fraction: f64) {
        let mapped = stage.map(fraction);
        let previous = self.current.fetch_max(mapped, Ordering::SeqCst);
        if mapped > previous {
            let _ = self.sender.send(mapped);
        }
    }

    /// Mark a stage finished.
    pub fn complete(&self, stage: Stage) {
        self.report(stage, 1.0);
    }

    /// Current in-process percentage.
    pub fn percent(&self) -> i32 {
        self.current.load(Ordering::SeqCst)
    }

    /// A callback handle for the transcoder: reports fractions of `stage`.
    pub fn stage_callback(self: &Arc<Self>, stage: Stage) -> impl Fn(f64) + Send + Sync {
        let tracker = Arc::clone(self);
        move |fraction| tracker.report(stage, fraction)
    }

    /// Stop accepting reports and wait for queued writes to land.
    pub async fn finish(self) {
        drop(self.sender);
        if let Err(e) = self.persister.await {
            tracing::warn!(video_id = %self.video_id, error = %e, "Progress persister task failed");
        }
    }
}
