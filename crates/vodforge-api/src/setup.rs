//! Application wiring: tracing, database, storage, services, routes, server.

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use http::HeaderValue;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use vodforge_core::Config;
use vodforge_db::{RenditionRepository, VideoRepository};
use vodforge_processing::{
    ChunkStore, FfmpegTranscoder, InMemorySessionStore, SessionReaper, SessionStore,
    UploadManager, VideoPipeline, VideoStateStore,
};

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;
use crate::video_state_impl::DbVideoState;

/// Extra headroom over the configured chunk size for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vodforge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Build the full application: pool, migrations, storage, services, routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router)> {
    let pool = vodforge_db::create_pool(&config.database)
        .await
        .context("connecting to database")?;
    vodforge_db::run_migrations(&pool)
        .await
        .context("running migrations")?;

    let storage = vodforge_storage::create_storage(&config.storage)
        .await
        .context("initializing storage backend")?;
    storage
        .ensure_public_read()
        .await
        .context("applying public-read policy")?;

    let videos = VideoRepository::new(pool.clone());
    let renditions = RenditionRepository::new(pool.clone());
    let video_state: Arc<dyn VideoStateStore> =
        Arc::new(DbVideoState::new(videos.clone(), renditions.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let chunks = ChunkStore::new(PathBuf::from(&config.upload.upload_dir).join("chunks"));

    let uploads = UploadManager::new(
        sessions.clone(),
        chunks.clone(),
        video_state.clone(),
        config.upload.clone(),
    );

    let transcoder = Arc::new(FfmpegTranscoder::new(config.transcode.clone()));
    let pipeline = VideoPipeline::new(
        video_state.clone(),
        storage.clone(),
        transcoder,
        config.transcode.clone(),
        &config.publish.public_base_url,
        PathBuf::from(&config.upload.upload_dir).join("scratch"),
    )?;
    pipeline
        .clear_stale_scratch()
        .await
        .context("clearing stale scratch directories")?;

    SessionReaper::new(
        sessions,
        chunks,
        video_state,
        config.upload.reap_interval_secs,
    )
    .spawn();

    let state = Arc::new(AppState {
        config: config.clone(),
        videos,
        storage,
        uploads,
        pipeline,
    });

    let router = build_router(state.clone(), &config);
    Ok((state, router))
}

fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let body_limit = config.upload.chunk_size_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let cors = if config.server.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/upload/init", post(handlers::upload::init_upload))
        .route("/upload/chunk", post(handlers::upload::upload_chunk))
        .route("/upload/complete", post(handlers::upload::complete_upload))
        .route(
            "/upload/{upload_id}/progress",
            get(handlers::upload::upload_progress),
        )
        .route(
            "/upload/{upload_id}/resume",
            get(handlers::upload::resume_upload),
        )
        .route("/upload/{upload_id}", delete(handlers::upload::cancel_upload))
        .route(
            "/videos/{video_id}/status",
            get(handlers::video::video_status),
        )
        .route(
            "/videos/{video_id}/reprocess",
            post(handlers::video::reprocess_video),
        )
        .route("/health", get(handlers::health::health))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the server with graceful shutdown.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server.port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        chunk_size_bytes = config.upload.chunk_size_bytes,
        max_file_size_bytes = config.upload.max_file_size_bytes,
        qualities = %config.transcode.qualities.join(","),
        segment_duration_secs = config.transcode.segment_duration_secs,
        max_concurrent_transcodes = config.transcode.max_concurrent_jobs,
        storage_backend = %config.storage.backend,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
