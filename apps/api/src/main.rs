mod config;
mod db;
mod errors;
mod export;
mod llm_client;
mod models;
mod pipeline;
mod profile;
mod relevance;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::export::RenderClient;
use crate::llm_client::{GeminiClient, GenerationClient};
use crate::profile::{FileStore, SqliteProfileStore};
use crate::routes::build_router;
use crate::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(SqliteProfileStore::new(pool));

    // Initialize upload storage
    let files = FileStore::new(&config.upload_dir);
    files.ensure_root().await?;
    info!("Uploads stored under {}", files.root().display());

    // Initialize generation client
    let gemini = GeminiClient::new(config.gemini_api_key.clone())?;
    let generator = GenerationClient::new(Arc::new(gemini));
    info!("Generation client initialized (model: {})", llm_client::MODEL);

    // Initialize PDF renderer client
    let renderer = RenderClient::new(config.pdf_render_url.clone())?;
    info!("PDF renderer at {}", config.pdf_render_url);

    let profile = config.load_static_profile()?;
    let state = AppState::new(store, files.clone(), generator, renderer, profile);

    // Reclaim optimization sessions nobody has touched for a while
    state.runs.spawn_reaper(SESSION_SWEEP_INTERVAL);

    // Build router
    let app = build_router(state)
        .nest_service("/uploads", ServeDir::new(files.root()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
