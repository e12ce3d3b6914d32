//! Repository for the `evaluations` table.
//!
//! The partial unique index `uq_evaluations_one_pending_per_batch` allows
//! at most one row with `evaluated_at IS NULL` per batch.

use coffeetrace_core::evaluation::{EvaluationPatch, NewPendingEvaluation};
use coffeetrace_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::evaluation::EvaluationRow;

/// Column list for `evaluations` queries.
const COLUMNS: &str = "\
    id, batch_id, result, comments, detailed_feedback, recommendations, \
    checkpoint_step_index, evaluated_at, evaluated_by, created_at, updated_at";

/// Provides pending/finalize operations and history for evaluations.
pub struct EvaluationRepo;

impl EvaluationRepo {
    /// Open the pending evaluation of a batch at a checkpoint.
    pub async fn open_pending(
        conn: &mut PgConnection,
        input: &NewPendingEvaluation,
    ) -> Result<EvaluationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO evaluations (batch_id, checkpoint_step_index) \
             VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvaluationRow>(&query)
            .bind(input.batch_id)
            .bind(input.checkpoint_step_index)
            .fetch_one(conn)
            .await
    }

    pub async fn find_pending(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Option<EvaluationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM evaluations \
             WHERE batch_id = $1 AND evaluated_at IS NULL"
        );
        sqlx::query_as::<_, EvaluationRow>(&query)
            .bind(batch_id)
            .fetch_optional(pool)
            .await
    }

    /// Finalized evaluations of a batch, newest first.
    pub async fn list_finalized(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<EvaluationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM evaluations \
             WHERE batch_id = $1 AND evaluated_at IS NOT NULL \
             ORDER BY evaluated_at DESC, id DESC"
        );
        sqlx::query_as::<_, EvaluationRow>(&query)
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Finalize a pending row in place.
    ///
    /// Returns `None` when the row does not exist, belongs to another batch,
    /// or was already finalized.
    pub async fn finalize(
        conn: &mut PgConnection,
        id: DbId,
        batch_id: DbId,
        patch: &EvaluationPatch,
    ) -> Result<Option<EvaluationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE evaluations SET \
                 result = $3, comments = $4, detailed_feedback = $5, \
                 recommendations = $6, evaluated_by = $7, evaluated_at = $8 \
             WHERE id = $1 AND batch_id = $2 AND evaluated_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvaluationRow>(&query)
            .bind(id)
            .bind(batch_id)
            .bind(patch.result.as_str())
            .bind(&patch.comments)
            .bind(&patch.detailed_feedback)
            .bind(&patch.recommendations)
            .bind(patch.evaluated_by)
            .bind(patch.evaluated_at)
            .fetch_optional(conn)
            .await
    }
}
