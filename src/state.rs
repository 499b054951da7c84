//! # Application State
//!
//! Shared state handed to every request handler. Axum clones it per request,
//! which is cheap: everything inside is behind an `Arc`.

use crate::clock::SystemClock;
use crate::config::{Config, StorageKind};
use crate::middleware::rate_limit::RequestLimiter;
use crate::protocol::AuthProtocol;
use crate::store::memory::MemoryStore;
use crate::store::sqlite::SqliteStore;
use anyhow::Result;
use std::sync::Arc;

/// The storage backend chosen at startup.
///
/// Kept around after building the protocol because the cookie session layer
/// wants to share the SQLite pool.
#[derive(Clone)]
pub enum Storage {
    Memory(Arc<MemoryStore>),
    Sqlite(Arc<SqliteStore>),
}

impl Storage {
    /// Open the configured backend. For SQLite this connects and runs migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        match config.storage {
            StorageKind::Memory => Ok(Storage::Memory(Arc::new(MemoryStore::new()))),
            StorageKind::Sqlite => {
                let store = SqliteStore::connect(&config.database_url).await?;
                Ok(Storage::Sqlite(Arc::new(store)))
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub protocol: Arc<AuthProtocol>,
    pub limiter: RequestLimiter,
}

impl AppState {
    pub fn new(config: &Config, storage: &Storage) -> Self {
        let settings = config.protocol_settings();
        let clock = Arc::new(SystemClock);

        let protocol = match storage {
            Storage::Memory(store) => AuthProtocol::with_store(store.clone(), clock, &settings),
            Storage::Sqlite(store) => AuthProtocol::with_store(store.clone(), clock, &settings),
        };

        AppState {
            protocol: Arc::new(protocol),
            limiter: RequestLimiter::new(config.rate_limit_per_second, config.rate_limit_burst),
        }
    }
}
