//! Storage abstraction trait
//!
//! Defines the operations the pipeline needs from object storage: key-addressed
//! writes with content type and cache headers (publisher), streamed and whole
//! downloads (source resolver), existence checks, deletes, and a one-shot
//! public-read policy setup so players can fetch manifests and segments
//! directly over HTTP.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use vodforge_core::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for vodforge_core::AppError {
    fn from(err: StorageError) -> Self {
        vodforge_core::AppError::Storage(err.to_string())
    }
}

/// A stream of downloaded bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Storage abstraction trait
///
/// All backends (S3, local filesystem) implement this so the publisher and
/// source resolver never couple to a concrete provider.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload data to a specific storage key with the given content type and
    /// Cache-Control header. Overwrites any existing object at the key.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<()>;

    /// Download a whole object by its storage key.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object as a stream of chunks (for large sources).
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete an object by its storage key. Deleting a missing key is not an
    /// error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Ensure the bucket/container allows anonymous GetObject so published
    /// manifests and segments are directly fetchable. Backends without a
    /// policy concept treat this as a no-op.
    async fn ensure_public_read(&self) -> StorageResult<()>;

    /// Get the storage backend type.
    fn backend_type(&self) -> StorageBackend;
}

/// Reject keys that could escape the storage root or surprise a backend.
pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.starts_with('/')
        || storage_key.split('/').any(|seg| seg == "..")
    {
        return Err(StorageError::InvalidKey(storage_key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_rejects_traversal() {
        assert!(validate_key("videos/hls/abc/master.m3u8").is_ok());
        assert!(validate_key("/videos/hls").is_err());
        assert!(validate_key("videos/../etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
