mod config;
mod errors;
mod models;
mod retrieval;
mod routes;
mod search;
mod state;
mod store;
mod upload;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::retrieval::HttpContentRetriever;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::RecordStore;
use crate::upload::transfer::HttpTransferClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Intake API v{}", env!("CARGO_PKG_VERSION"));

    // Seed the record store with the default groups
    let store = RecordStore::bootstrap();
    info!("Record store initialized ({} groups)", store.groups().len());

    // External collaborators
    let transfer = Arc::new(HttpTransferClient::new(
        &config.transfer_service_url,
        config.api_token.clone(),
    )?);
    info!("Transfer client initialized ({})", config.transfer_service_url);

    let retriever = Arc::new(HttpContentRetriever::new(
        &config.resume_api_url,
        config.api_token.clone(),
    )?);

    // Build app state (also starts the search listener)
    let state = AppState::new(config.clone(), store, transfer, retriever);
    info!(
        "Search debounce {}ms, file limit {} bytes",
        config.search_debounce_ms, config.max_file_bytes
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
