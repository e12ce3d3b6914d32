//! Processing batch rows and DTOs.

use coffeetrace_core::batch::ProcessingBatch;
use coffeetrace_core::error::CoreError;
use coffeetrace_core::status::{BatchStatus, StatusId};
use coffeetrace_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `processing_batches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchRow {
    pub id: DbId,
    pub method_id: DbId,
    pub status_id: StatusId,
    pub current_stage_id: Option<DbId>,
    pub total_input_quantity: f64,
    pub total_output_quantity: f64,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<BatchRow> for ProcessingBatch {
    type Error = CoreError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::from_id(row.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Batch {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        Ok(ProcessingBatch {
            id: row.id,
            method_id: row.method_id,
            status,
            current_stage_id: row.current_stage_id,
            total_input_quantity: row.total_input_quantity,
            total_output_quantity: row.total_output_quantity,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for registering a new batch. Status always starts at `NotStarted`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatch {
    pub method_id: DbId,
    pub total_input_quantity: f64,
}
