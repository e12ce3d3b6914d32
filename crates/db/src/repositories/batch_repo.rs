//! Repository for the `processing_batches` table.
//!
//! Status writes are version-guarded: every update matches on the version
//! the caller read and bumps it. A guarded update that matches no row
//! returns `None`, which callers treat as a concurrent modification.

use coffeetrace_core::status::{BatchStatus, StatusId};
use coffeetrace_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::batch::{BatchRow, CreateBatch};

/// Column list for `processing_batches` queries.
const COLUMNS: &str = "\
    id, method_id, status_id, current_stage_id, total_input_quantity, \
    total_output_quantity, version, created_at, updated_at";

/// Provides CRUD and guarded status updates for processing batches.
pub struct BatchRepo;

impl BatchRepo {
    /// Register a new batch in `NotStarted`.
    pub async fn create(pool: &PgPool, input: &CreateBatch) -> Result<BatchRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO processing_batches (method_id, status_id, total_input_quantity) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(input.method_id)
            .bind(BatchStatus::NotStarted.id())
            .bind(input.total_input_quantity)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BatchRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processing_batches WHERE id = $1");
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set status unconditionally and bump the version.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: BatchStatus,
    ) -> Result<Option<BatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE processing_batches \
             SET status_id = $2, version = version + 1 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(id)
            .bind(StatusId::from(status))
            .fetch_optional(pool)
            .await
    }

    /// Apply the effects of an accepted progress record.
    pub async fn apply_progress(
        conn: &mut PgConnection,
        id: DbId,
        expected_version: i32,
        status: BatchStatus,
        current_stage_id: DbId,
        total_output_quantity: f64,
    ) -> Result<Option<BatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE processing_batches \
             SET status_id = $3, current_stage_id = $4, total_output_quantity = $5, \
                 version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(StatusId::from(status))
            .bind(current_stage_id)
            .bind(total_output_quantity)
            .fetch_optional(conn)
            .await
    }

    /// Apply the status that follows an evaluation verdict.
    pub async fn apply_status(
        conn: &mut PgConnection,
        id: DbId,
        expected_version: i32,
        status: BatchStatus,
    ) -> Result<Option<BatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE processing_batches \
             SET status_id = $3, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(StatusId::from(status))
            .fetch_optional(conn)
            .await
    }
}
