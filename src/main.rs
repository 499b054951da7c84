//! # authgrid server
//!
//! Serves the challenge-response protocol over HTTP.

use authgrid::config::Config;
use authgrid::router::build_router;
use authgrid::state::{AppState, Storage};
use std::time::Duration;
use tower_sessions::MemoryStore as MemorySessionStore;
use tower_sessions_sqlx_store::SqliteStore as SqliteSessionStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,authgrid=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let storage = Storage::open(&config).await?;
    let app_state = AppState::new(&config, &storage);
    tracing::info!("Application state initialized ({:?} storage)", config.storage);

    // Expired challenges and sessions are rejected on read regardless; this only reclaims space
    let cleanup_protocol = app_state.protocol.clone();
    let cleanup_every = Duration::from_secs(config.cleanup_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        loop {
            interval.tick().await;
            tracing::debug!("Running expiry cleanup task");
            match cleanup_protocol.purge_expired().await {
                Ok((challenges, sessions)) if challenges + sessions > 0 => {
                    tracing::info!(
                        "Purged {} expired challenges and {} expired sessions",
                        challenges,
                        sessions
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Expiry cleanup failed: {:?}", e),
            }
        }
    });

    let app = match &storage {
        Storage::Sqlite(store) => {
            let session_store = SqliteSessionStore::new(store.pool().clone());
            session_store.migrate().await?;
            build_router(app_state, session_store)
        }
        Storage::Memory(_) => build_router(app_state, MemorySessionStore::default()),
    };

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
