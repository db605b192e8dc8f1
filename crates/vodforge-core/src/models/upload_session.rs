use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Ephemeral state of one in-flight chunked upload. Owned by the session
/// store; destroyed at complete, cancel, or expiry.
///
/// Invariant: `received ⊆ [0, total_chunks)`. Assembly may proceed only when
/// `received.len() == total_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub upload_id: Uuid,
    pub video_id: Uuid,
    pub total_chunks: u32,
    pub received: HashSet<u32>,
    pub chunk_size_bytes: u64,
    pub expected_file_size: u64,
    pub original_filename: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    /// Number of chunks for a file of `file_size` at `chunk_size` (ceiling).
    pub fn chunk_count(file_size: u64, chunk_size: u64) -> u32 {
        file_size.div_ceil(chunk_size) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() as u32 == self.total_chunks
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Indexes in `[0, total_chunks)` not yet received, ascending.
    pub fn missing_indexes(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.received.contains(i))
            .collect()
    }

    /// Upload progress as a 0–100 percentage.
    pub fn percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.received.len() as f64 / self.total_chunks as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(total: u32) -> UploadSession {
        let now = Utc::now();
        UploadSession {
            upload_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            total_chunks: total,
            received: HashSet::new(),
            chunk_size_bytes: 5 * 1024 * 1024,
            expected_file_size: 12 * 1024 * 1024,
            original_filename: "lecture.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(UploadSession::chunk_count(12 * 1024 * 1024, 5 * 1024 * 1024), 3);
        assert_eq!(UploadSession::chunk_count(10 * 1024 * 1024, 5 * 1024 * 1024), 2);
        assert_eq!(UploadSession::chunk_count(1, 5 * 1024 * 1024), 1);
    }

    #[test]
    fn missing_indexes_are_ascending() {
        let mut s = session(4);
        s.received.insert(2);
        s.received.insert(0);
        assert_eq!(s.missing_indexes(), vec![1, 3]);
        assert!(!s.is_complete());
    }

    #[test]
    fn complete_when_all_received() {
        let mut s = session(3);
        for i in 0..3 {
            s.received.insert(i);
        }
        assert!(s.is_complete());
        assert!(s.missing_indexes().is_empty());
        assert_eq!(s.percent(), 100.0);
    }
}
