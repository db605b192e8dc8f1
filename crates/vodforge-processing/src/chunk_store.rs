//! Durable temporary storage for arriving byte ranges of in-flight uploads.
//!
//! Fragments live under `{base_dir}/{upload_id}/chunk_{index:06}`. Writes are
//! per-index and idempotent; assembly concatenates fragments in index order.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use vodforge_core::AppError;

#[derive(Clone)]
pub struct ChunkStore {
    base_dir: PathBuf,
}

impl ChunkStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn upload_dir(&self, upload_id: Uuid) -> PathBuf {
        self.base_dir.join(upload_id.to_string())
    }

    fn chunk_path(&self, upload_id: Uuid, index: u32) -> PathBuf {
        self.upload_dir(upload_id).join(format!("chunk_{:06}", index))
    }

    /// Write one fragment. Re-sending an index overwrites the previous bytes.
    pub async fn write_chunk(
        &self,
        upload_id: Uuid,
        index: u32,
        data: &[u8],
    ) -> Result<(), AppError> {
        let dir = self.upload_dir(upload_id);
        fs::create_dir_all(&dir).await?;

        let path = self.chunk_path(upload_id, index);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        tracing::debug!(
            upload_id = %upload_id,
            chunk_index = index,
            bytes = data.len(),
            "Chunk fragment written"
        );
        Ok(())
    }

    /// Concatenate fragments `0..total_chunks` in index order into `dest`.
    /// Returns the assembled size in bytes. Fragments are left in place; the
    /// caller deletes them after verifying the assembled size.
    pub async fn assemble(
        &self,
        upload_id: Uuid,
        total_chunks: u32,
        dest: &Path,
    ) -> Result<u64, AppError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let out = fs::File::create(dest).await?;
        let mut writer = BufWriter::new(out);
        let mut total_bytes = 0u64;

        for index in 0..total_chunks {
            let path = self.chunk_path(upload_id, index);
            let mut fragment = fs::File::open(&path).await.map_err(|e| {
                AppError::Internal(format!(
                    "missing fragment {} for upload {}: {}",
                    index, upload_id, e
                ))
            })?;
            total_bytes += tokio::io::copy(&mut fragment, &mut writer).await?;
        }

        writer.flush().await?;
        Ok(total_bytes)
    }

    /// Delete every fragment (and the directory) for an upload. Missing
    /// directories are not an error.
    pub async fn remove_upload(&self, upload_id: Uuid) -> Result<(), AppError> {
        let dir = self.upload_dir(upload_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn assembles_in_index_order_regardless_of_arrival() {
        let (dir, store) = store();
        let upload_id = Uuid::new_v4();

        // Arrive out of order: 1, 0, 2
        store.write_chunk(upload_id, 1, b"bbbb").await.unwrap();
        store.write_chunk(upload_id, 0, b"aaaa").await.unwrap();
        store.write_chunk(upload_id, 2, b"cc").await.unwrap();

        let dest = dir.path().join("assembled.bin");
        let size = store.assemble(upload_id, 3, &dest).await.unwrap();
        assert_eq!(size, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"aaaabbbbcc");
    }

    #[tokio::test]
    async fn rewriting_a_chunk_overwrites_it() {
        let (dir, store) = store();
        let upload_id = Uuid::new_v4();

        store.write_chunk(upload_id, 0, b"old-bytes").await.unwrap();
        store.write_chunk(upload_id, 0, b"new").await.unwrap();
        store.write_chunk(upload_id, 1, b"!").await.unwrap();

        let dest = dir.path().join("assembled.bin");
        let size = store.assemble(upload_id, 2, &dest).await.unwrap();
        assert_eq!(size, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new!");
    }

    #[tokio::test]
    async fn assemble_fails_on_missing_fragment() {
        let (dir, store) = store();
        let upload_id = Uuid::new_v4();
        store.write_chunk(upload_id, 0, b"aa").await.unwrap();

        let dest = dir.path().join("assembled.bin");
        let result = store.assemble(upload_id, 2, &dest).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn remove_upload_is_idempotent() {
        let (_dir, store) = store();
        let upload_id = Uuid::new_v4();
        store.write_chunk(upload_id, 0, b"x").await.unwrap();

        store.remove_upload(upload_id).await.unwrap();
        store.remove_upload(upload_id).await.unwrap();
    }
}
