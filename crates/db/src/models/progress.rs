//! Progress record rows.

use coffeetrace_core::progress::ProgressRecord;
use coffeetrace_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `progress_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProgressRow {
    pub id: DbId,
    pub batch_id: DbId,
    pub stage_id: DbId,
    pub stage_name: String,
    pub step_index: i32,
    pub progress_date: Timestamp,
    pub output_quantity: f64,
    pub output_unit: String,
    pub notes: Option<String>,
    pub media_refs: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        ProgressRecord {
            id: row.id,
            batch_id: row.batch_id,
            stage_id: row.stage_id,
            stage_name: row.stage_name,
            step_index: row.step_index,
            progress_date: row.progress_date,
            output_quantity: row.output_quantity,
            output_unit: row.output_unit,
            notes: row.notes,
            media_refs: row.media_refs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
