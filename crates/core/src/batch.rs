//! Processing batches and status derivation.
//!
//! Batch status is never set by clients (except cancel). These functions are
//! the single source of truth for which status follows a progress insert or
//! an evaluation verdict.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::evaluation::EvaluationResult;
use crate::status::BatchStatus;
use crate::types::{DbId, Timestamp};

/// A coffee batch moving through the stages of one processing method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingBatch {
    pub id: DbId,
    pub method_id: DbId,
    pub status: BatchStatus,
    /// Stage of the most recent progress record, kept alongside each insert.
    pub current_stage_id: Option<DbId>,
    pub total_input_quantity: f64,
    pub total_output_quantity: f64,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Progress may only be recorded on a batch that is not started or in progress.
pub fn ensure_accepts_progress(current: BatchStatus) -> Result<(), CoreError> {
    match current {
        BatchStatus::NotStarted | BatchStatus::InProgress => Ok(()),
        BatchStatus::AwaitingEvaluation => Err(CoreError::IllegalTransition(
            "Batch is awaiting evaluation; progress cannot be recorded until an expert submits a verdict"
                .to_string(),
        )),
        BatchStatus::Completed | BatchStatus::Cancelled => Err(CoreError::IllegalTransition(
            format!("Batch is {}; no further progress can be recorded", current.label()),
        )),
    }
}

/// Status after a progress record is inserted.
///
/// `reached_last_stage` is true when the record is for the catalog's final
/// stage, which opens the evaluation checkpoint.
pub fn status_after_progress(
    current: BatchStatus,
    reached_last_stage: bool,
) -> Result<BatchStatus, CoreError> {
    ensure_accepts_progress(current)?;
    Ok(if reached_last_stage {
        BatchStatus::AwaitingEvaluation
    } else {
        BatchStatus::InProgress
    })
}

/// Status after the pending evaluation is finalized with `result`.
pub fn status_after_evaluation(
    current: BatchStatus,
    result: EvaluationResult,
) -> Result<BatchStatus, CoreError> {
    if current != BatchStatus::AwaitingEvaluation {
        return Err(CoreError::IllegalTransition(format!(
            "Batch is {}; only batches awaiting evaluation can be evaluated",
            current.label()
        )));
    }

    Ok(match result {
        EvaluationResult::Pass => BatchStatus::Completed,
        EvaluationResult::Fail | EvaluationResult::NeedsImprovement => BatchStatus::InProgress,
        EvaluationResult::Temporary => BatchStatus::AwaitingEvaluation,
    })
}

/// Cancel is allowed from every status except `Cancelled` itself.
pub fn ensure_can_cancel(current: BatchStatus) -> Result<(), CoreError> {
    if current == BatchStatus::Cancelled {
        return Err(CoreError::IllegalTransition(
            "Batch is already cancelled".to_string(),
        ));
    }
    Ok(())
}
