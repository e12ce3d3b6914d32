//! Evaluation rows.
//!
//! `result` is stored as TEXT (`pass`, `fail`, `needs_improvement`,
//! `temporary`) and is NULL while the evaluation is pending.

use coffeetrace_core::error::CoreError;
use coffeetrace_core::evaluation::{EvaluationOutcome, EvaluationResult};
use coffeetrace_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `evaluations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvaluationRow {
    pub id: DbId,
    pub batch_id: DbId,
    pub result: Option<String>,
    pub comments: String,
    pub detailed_feedback: String,
    pub recommendations: String,
    pub checkpoint_step_index: i32,
    pub evaluated_at: Option<Timestamp>,
    pub evaluated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<EvaluationRow> for EvaluationOutcome {
    type Error = CoreError;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        let result = row
            .result
            .as_deref()
            .map(str::parse::<EvaluationResult>)
            .transpose()
            .map_err(|e| {
                CoreError::Internal(format!("Evaluation {} has invalid result: {e}", row.id))
            })?;
        Ok(EvaluationOutcome {
            id: row.id,
            batch_id: row.batch_id,
            result,
            comments: row.comments,
            detailed_feedback: row.detailed_feedback,
            recommendations: row.recommendations,
            checkpoint_step_index: row.checkpoint_step_index,
            evaluated_at: row.evaluated_at,
            evaluated_by: row.evaluated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
