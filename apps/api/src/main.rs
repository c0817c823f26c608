mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;
mod storage;
mod summary;
mod transcript;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::build_archive;
use crate::summary::collector::{CollectorSettings, SummaryDataCollector};
use crate::summary::sources::{PgAudienceStats, PgBroadcastRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Summary API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize summary archive (local directory or S3)
    let archive = build_archive(&config.storage).await;

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let collector = Arc::new(SummaryDataCollector::new(
        Arc::new(PgBroadcastRepository::new(db.clone())),
        Arc::new(PgAudienceStats::new(db.clone())),
        CollectorSettings {
            instructions_path: config.instructions_path.clone(),
            broadcaster: config.broadcaster_username.clone(),
        },
    ));
    info!(
        "Summary collector ready (broadcaster: {}, instructions: {})",
        config.broadcaster_username,
        config.instructions_path.display()
    );

    let state = AppState {
        db,
        llm,
        collector,
        archive,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the admin panel origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
