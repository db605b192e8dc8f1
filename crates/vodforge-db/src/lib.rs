//! Vodforge database layer
//!
//! Repositories over PostgreSQL for the Video and Rendition records. Queries
//! are dynamic (no compile-time DATABASE_URL requirement); migrations live in
//! `migrations/` and run via `run_migrations` at startup.

pub mod rendition_repository;
pub mod video_repository;

pub use rendition_repository::RenditionRepository;
pub use video_repository::VideoRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use vodforge_core::DatabaseConfig;

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.timeout_seconds))
        .connect(&config.url)
        .await
}

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
