//! Persistence seams consumed by the progression engine.
//!
//! The engine never talks to a database directly. Reads go through the four
//! lookup traits; every write that changes batch status goes through one of
//! the [`ProgressionStore`] commit units, which must apply all of their parts
//! or none of them.

use async_trait::async_trait;

use crate::batch::ProcessingBatch;
use crate::error::CoreError;
use crate::evaluation::{EvaluationOutcome, EvaluationPatch, NewPendingEvaluation};
use crate::progress::{NewProgressRecord, ProgressRecord, UpdateProgressNotes};
use crate::stage_catalog::Stage;
use crate::status::BatchStatus;
use crate::types::DbId;

/// Stage lookup service.
#[async_trait]
pub trait StageLookup: Send + Sync {
    /// All stages of a processing method; empty for an unknown method.
    async fn get_stages_for_method(&self, method_id: DbId) -> Result<Vec<Stage>, CoreError>;
}

/// Progress record store.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// All records of a batch ordered by step index.
    async fn list_progress(&self, batch_id: DbId) -> Result<Vec<ProgressRecord>, CoreError>;

    async fn find_progress(&self, progress_id: DbId) -> Result<Option<ProgressRecord>, CoreError>;

    /// Update the notes/media of a record; `None` if it does not exist.
    async fn update_progress_notes(
        &self,
        progress_id: DbId,
        patch: &UpdateProgressNotes,
    ) -> Result<Option<ProgressRecord>, CoreError>;
}

/// Evaluation outcome store.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// The single unfinalized outcome of a batch, if one is open.
    async fn get_pending_evaluation(
        &self,
        batch_id: DbId,
    ) -> Result<Option<EvaluationOutcome>, CoreError>;

    /// Finalized outcomes of a batch, newest first.
    async fn list_evaluations(&self, batch_id: DbId) -> Result<Vec<EvaluationOutcome>, CoreError>;
}

/// Batch store.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn get_batch(&self, batch_id: DbId) -> Result<Option<ProcessingBatch>, CoreError>;

    /// Set the status directly (used for cancel) and bump the version.
    async fn set_batch_status(
        &self,
        batch_id: DbId,
        status: BatchStatus,
    ) -> Result<ProcessingBatch, CoreError>;
}

/// Everything written when a progress record is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressCommit {
    /// Batch version the decision was computed against.
    pub expected_version: i32,
    pub record: NewProgressRecord,
    pub status: BatchStatus,
    /// Pending evaluation to open when the record reaches the checkpoint.
    pub open_evaluation: Option<NewPendingEvaluation>,
}

/// Everything written when a pending evaluation is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationCommit {
    pub batch_id: DbId,
    /// Batch version the decision was computed against.
    pub expected_version: i32,
    pub evaluation_id: DbId,
    pub patch: EvaluationPatch,
    pub status: BatchStatus,
    /// Fresh pending evaluation, opened when the verdict keeps the batch at
    /// the checkpoint.
    pub reopen_evaluation: Option<NewPendingEvaluation>,
}

/// Full store used by the progression engine.
///
/// Commit units fail with [`CoreError::Conflict`] when the batch version no
/// longer equals `expected_version`, or when the evaluation being finalized
/// is no longer pending.
#[async_trait]
pub trait ProgressionStore: StageLookup + ProgressStore + EvaluationStore + BatchStore {
    /// Insert the record, update batch status, current stage and output
    /// quantity, and open the pending evaluation if requested.
    async fn commit_progress(&self, commit: &ProgressCommit) -> Result<ProgressRecord, CoreError>;

    /// Finalize the pending evaluation, update batch status and reopen a
    /// pending evaluation if requested.
    async fn commit_evaluation(
        &self,
        commit: &EvaluationCommit,
    ) -> Result<EvaluationOutcome, CoreError>;
}
