//! Upload session store.
//!
//! Sessions are keyed by upload id and mutated only through the store so the
//! received-set update is atomic under concurrent chunk arrivals. The trait
//! lets the in-process implementation be swapped for a shared store (e.g. a
//! distributed cache) without touching callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use vodforge_core::models::UploadSession;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    async fn put(&self, session: UploadSession);

    /// Fetch a session snapshot.
    async fn get(&self, upload_id: Uuid) -> Option<UploadSession>;

    /// Atomically record a received chunk index, returning the updated
    /// snapshot. `None` if the session does not exist.
    async fn mark_received(&self, upload_id: Uuid, index: u32) -> Option<UploadSession>;

    /// Remove and return a session.
    async fn remove(&self, upload_id: Uuid) -> Option<UploadSession>;

    /// Remove and return every session whose `expires_at` has passed.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Vec<UploadSession>;
}

/// Single-node in-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, UploadSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: UploadSession) {
        self.sessions
            .write()
            .await
            .insert(session.upload_id, session);
    }

    async fn get(&self, upload_id: Uuid) -> Option<UploadSession> {
        self.sessions.read().await.get(&upload_id).cloned()
    }

    async fn mark_received(&self, upload_id: Uuid, index: u32) -> Option<UploadSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&upload_id)?;
        session.received.insert(index);
        Some(session.clone())
    }

    async fn remove(&self, upload_id: Uuid) -> Option<UploadSession> {
        self.sessions.write().await.remove(&upload_id)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Vec<UploadSession> {
        let mut sessions = self.sessions.write().await;
        let expired_ids: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.upload_id)
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn session(expires_in: Duration) -> UploadSession {
        let now = Utc::now();
        UploadSession {
            upload_id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            total_chunks: 8,
            received: HashSet::new(),
            chunk_size_bytes: 1024,
            expected_file_size: 8 * 1024,
            original_filename: "clip.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn concurrent_marks_lose_no_updates() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = session(Duration::hours(1));
        let upload_id = s.upload_id;
        store.put(s).await;

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mark_received(upload_id, i).await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_some());
        }

        let snapshot = store.get(upload_id).await.unwrap();
        assert_eq!(snapshot.received.len(), 8);
        assert!(snapshot.is_complete());
    }

    #[tokio::test]
    async fn duplicate_mark_does_not_double_count() {
        let store = InMemorySessionStore::new();
        let s = session(Duration::hours(1));
        let upload_id = s.upload_id;
        store.put(s).await;

        store.mark_received(upload_id, 3).await.unwrap();
        let snapshot = store.mark_received(upload_id, 3).await.unwrap();
        assert_eq!(snapshot.received.len(), 1);
    }

    #[tokio::test]
    async fn remove_expired_only_takes_expired() {
        let store = InMemorySessionStore::new();
        let fresh = session(Duration::hours(1));
        let stale = session(Duration::seconds(-10));
        let fresh_id = fresh.upload_id;
        let stale_id = stale.upload_id;
        store.put(fresh).await;
        store.put(stale).await;

        let removed = store.remove_expired(Utc::now()).await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].upload_id, stale_id);
        assert!(store.get(fresh_id).await.is_some());
        assert!(store.get(stale_id).await.is_none());
    }
}
