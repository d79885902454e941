// Main entry point for the engagement API server

use std::sync::Arc;

use anyhow::{Context, Result};
use engagement::{DocumentStore, MemoryStore, PostgresStore};
use server_core::{
    server::{build_app, AppState},
    Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,engagement=debug,server_core=debug,sqlx=warn,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting engagement API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    match config.database_url.as_deref() {
        Some(url) => {
            // Connects and creates tables if missing
            tracing::info!("Connecting to database...");
            let store = PostgresStore::new(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");
            serve(Arc::new(store), &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: DocumentStore + 'static>(store: Arc<S>, config: &Config) -> Result<()> {
    let app = build_app(AppState::new(store, config));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
