use std::sync::Arc;

use coffeetrace_core::progression::BatchProgressionEngine;
use coffeetrace_db::PgProgressionStore;

use crate::config::ServerConfig;

/// Progression engine over the Postgres store.
pub type Engine = BatchProgressionEngine<PgProgressionStore>;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: coffeetrace_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// The only writer of batch status.
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(pool: coffeetrace_db::DbPool, config: ServerConfig) -> Self {
        let engine = BatchProgressionEngine::new(PgProgressionStore::new(pool.clone()));
        Self {
            pool,
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
