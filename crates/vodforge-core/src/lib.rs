//! Vodforge Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! storage-key layout shared across all Vodforge components.

pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    Config, DatabaseConfig, PublishConfig, ServerConfig, StorageConfig, TranscodeConfig,
    UploadConfig,
};
pub use error::AppError;
pub use storage_types::StorageBackend;
