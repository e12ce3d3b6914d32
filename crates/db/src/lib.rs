//! PostgreSQL persistence for batches, stages, progress and evaluations.
//!
//! Repositories are zero-sized structs over `&PgPool` (or a transaction's
//! connection). [`PgProgressionStore`] adapts them to the store traits the
//! progression engine runs on.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod progression_store;
pub mod repositories;

pub use progression_store::PgProgressionStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
