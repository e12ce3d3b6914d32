//! Repository for the `progress_records` table.

use coffeetrace_core::progress::{NewProgressRecord, UpdateProgressNotes};
use coffeetrace_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::progress::ProgressRow;

/// Column list for `progress_records` queries.
const COLUMNS: &str = "\
    id, batch_id, stage_id, stage_name, step_index, progress_date, \
    output_quantity, output_unit, notes, media_refs, created_at, updated_at";

/// Provides insert, read and notes-update operations for progress records.
pub struct ProgressRepo;

impl ProgressRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewProgressRecord,
    ) -> Result<ProgressRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO progress_records \
                 (batch_id, stage_id, stage_name, step_index, progress_date, \
                  output_quantity, output_unit, notes, media_refs) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(input.batch_id)
            .bind(input.stage_id)
            .bind(&input.stage_name)
            .bind(input.step_index)
            .bind(input.progress_date)
            .bind(input.output_quantity)
            .bind(&input.output_unit)
            .bind(&input.notes)
            .bind(&input.media_refs)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProgressRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM progress_records WHERE id = $1");
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All records of a batch, ordered by `step_index` ascending.
    pub async fn list_by_batch(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<ProgressRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM progress_records \
             WHERE batch_id = $1 ORDER BY step_index ASC"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Update notes and/or media. Absent fields keep their current value.
    pub async fn update_notes(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProgressNotes,
    ) -> Result<Option<ProgressRow>, sqlx::Error> {
        let query = format!(
            "UPDATE progress_records SET \
                 notes = COALESCE($2, notes), \
                 media_refs = COALESCE($3, media_refs) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(id)
            .bind(&input.notes)
            .bind(&input.media_refs)
            .fetch_optional(pool)
            .await
    }
}
