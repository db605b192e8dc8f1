//! Vodforge storage library
//!
//! Storage abstraction and backends for publishing HLS artifacts and
//! retaining upload sources. Keys follow the layout in
//! `vodforge_core::keys`; they must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vodforge_core::StorageBackend;
