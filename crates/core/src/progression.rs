//! Batch progression engine.
//!
//! The only component allowed to change a batch's status. Every operation
//! reads a snapshot through the store traits, decides with the pure
//! functions in [`crate::stage_advancer`], [`crate::evaluation`] and
//! [`crate::batch`], and writes the outcome through a single commit unit
//! guarded by the batch version it read.

use chrono::Utc;
use serde::Serialize;

use crate::batch::{self, ProcessingBatch};
use crate::error::CoreError;
use crate::evaluation::{
    self, EvaluationOutcome, EvaluationResult, EvaluationSubmission, NewPendingEvaluation,
};
use crate::progress::{self, NewProgressRecord, ProgressData, ProgressRecord, UpdateProgressNotes};
use crate::stage_advancer::{self, ActiveRework, NextStage};
use crate::stage_catalog::{MatchStrategy, Stage, StageCatalog, StageRef};
use crate::status::BatchStatus;
use crate::store::{EvaluationCommit, ProgressCommit, ProgressionStore};
use crate::types::DbId;

/// What the farmer should redo after a negative verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryGuidance {
    pub evaluation_id: DbId,
    pub result: EvaluationResult,
    pub stage_to_redo: Stage,
    pub reason: String,
    pub recommendations: String,
}

/// Result of an accepted progress record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressOutcome {
    pub record: ProgressRecord,
    pub status: BatchStatus,
    /// True when this record reached the checkpoint and opened an evaluation.
    pub evaluation_opened: bool,
}

/// Everything a decision about one batch is computed from.
struct Snapshot {
    batch: ProcessingBatch,
    catalog: StageCatalog,
    records: Vec<ProgressRecord>,
    evaluations: Vec<EvaluationOutcome>,
}

impl Snapshot {
    fn next_stage(&self) -> Result<NextStage, CoreError> {
        let rework = stage_advancer::active_rework(&self.evaluations, &self.records);
        stage_advancer::next_stage(self.catalog.stages(), &self.records, rework.as_ref())
    }
}

/// Orchestrates stage advancement and evaluation over a [`ProgressionStore`].
pub struct BatchProgressionEngine<S> {
    store: S,
}

impl<S: ProgressionStore> BatchProgressionEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ordered stage catalog of a processing method.
    pub async fn stages_for(&self, method_id: DbId) -> Result<StageCatalog, CoreError> {
        let stages = self.store.get_stages_for_method(method_id).await?;
        StageCatalog::new(method_id, stages).inspect_err(|e| {
            if let CoreError::Internal(msg) = e {
                tracing::error!(method_id, error = %msg, "Invalid stage catalog");
            }
        })
    }

    pub async fn batch(&self, batch_id: DbId) -> Result<ProcessingBatch, CoreError> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ProcessingBatch",
                id: batch_id,
            })
    }

    async fn snapshot(&self, batch_id: DbId) -> Result<Snapshot, CoreError> {
        let batch = self.batch(batch_id).await?;
        let catalog = self.stages_for(batch.method_id).await?;
        let records = self.store.list_progress(batch_id).await?;
        let evaluations = self.store.list_evaluations(batch_id).await?;
        Ok(Snapshot {
            batch,
            catalog,
            records,
            evaluations,
        })
    }

    /// The stage the batch must record next, or `Complete`.
    pub async fn next_stage(&self, batch_id: DbId) -> Result<NextStage, CoreError> {
        self.snapshot(batch_id).await?.next_stage()
    }

    /// Record progress against `stage_choice`.
    ///
    /// The choice is resolved against the catalog (id, then name, then
    /// position) and must land on the stage [`Self::next_stage`] computes.
    pub async fn record_progress(
        &self,
        batch_id: DbId,
        stage_choice: &StageRef,
        data: ProgressData,
    ) -> Result<ProgressOutcome, CoreError> {
        progress::validate_progress_data(&data)?;

        let snap = self.snapshot(batch_id).await?;
        batch::ensure_accepts_progress(snap.batch.status)?;

        let legal = match snap.next_stage()? {
            NextStage::Stage(stage) => stage,
            NextStage::Complete => {
                return Err(CoreError::IllegalTransition(
                    "Every stage of this batch has already been recorded".to_string(),
                ))
            }
        };

        let (chosen, strategy) = snap.catalog.resolve(stage_choice).ok_or_else(|| {
            CoreError::IllegalTransition(format!(
                "Stage {stage_choice:?} is not part of this processing method"
            ))
        })?;
        if chosen.id != legal.id {
            return Err(CoreError::IllegalTransition(format!(
                "Stage '{}' cannot be recorded now; the next stage is '{}'",
                chosen.name, legal.name
            )));
        }
        if strategy != MatchStrategy::Id {
            tracing::warn!(
                batch_id,
                stage_id = legal.id,
                ?strategy,
                "Stage choice matched by fallback strategy"
            );
        }

        let reached_last_stage = snap.catalog.is_last(&legal);
        let status = batch::status_after_progress(snap.batch.status, reached_last_stage)?;
        let step_index = progress::next_step_index(&snap.records);
        let open_evaluation = (status == BatchStatus::AwaitingEvaluation).then_some(
            NewPendingEvaluation {
                batch_id,
                checkpoint_step_index: step_index,
            },
        );

        let commit = ProgressCommit {
            expected_version: snap.batch.version,
            record: NewProgressRecord {
                batch_id,
                stage_id: legal.id,
                stage_name: legal.name.clone(),
                step_index,
                progress_date: data.progress_date,
                output_quantity: data.output_quantity,
                output_unit: data.output_unit.trim().to_string(),
                notes: data.notes,
                media_refs: data.media_refs,
            },
            status,
            open_evaluation,
        };
        let record = self.store.commit_progress(&commit).await?;

        tracing::info!(
            batch_id,
            stage = %legal.name,
            step_index,
            from = ?snap.batch.status,
            to = ?status,
            "Progress recorded"
        );
        if open_evaluation.is_some() {
            tracing::info!(batch_id, step_index, "Batch reached evaluation checkpoint");
        }

        Ok(ProgressOutcome {
            record,
            status,
            evaluation_opened: open_evaluation.is_some(),
        })
    }

    /// Finalize the batch's pending evaluation with an expert verdict.
    pub async fn submit_evaluation(
        &self,
        batch_id: DbId,
        submission: &EvaluationSubmission,
    ) -> Result<EvaluationOutcome, CoreError> {
        evaluation::validate_submission(submission)?;

        let batch = self.batch(batch_id).await?;
        let status = batch::status_after_evaluation(batch.status, submission.result)?;
        let catalog = self.stages_for(batch.method_id).await?;
        let pending = self
            .store
            .get_pending_evaluation(batch_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "PendingEvaluation",
                id: batch_id,
            })?;

        let patch = evaluation::build_finalization(&catalog, submission, Utc::now())?;
        let reopen_evaluation = (submission.result == EvaluationResult::Temporary).then_some(
            NewPendingEvaluation {
                batch_id,
                checkpoint_step_index: pending.checkpoint_step_index,
            },
        );

        let commit = EvaluationCommit {
            batch_id,
            expected_version: batch.version,
            evaluation_id: pending.id,
            patch,
            status,
            reopen_evaluation,
        };
        let outcome = self.store.commit_evaluation(&commit).await?;

        tracing::info!(
            batch_id,
            evaluation_id = outcome.id,
            result = submission.result.as_str(),
            evaluated_by = submission.evaluated_by,
            from = ?batch.status,
            to = ?status,
            "Evaluation submitted"
        );

        Ok(outcome)
    }

    /// Which stage to redo after the latest verdict, `None` unless that
    /// verdict was `Fail` or `NeedsImprovement`.
    ///
    /// The stage is the one [`Self::next_stage`] sends the batch back to,
    /// so a free-text or unresolvable comment points at the last stage.
    pub async fn retry_guidance(&self, batch_id: DbId) -> Result<Option<RetryGuidance>, CoreError> {
        let batch = self.batch(batch_id).await?;
        let evaluations = self.store.list_evaluations(batch_id).await?;

        // Newest first, ties already broken by id.
        let Some(latest) = evaluations.first() else {
            return Ok(None);
        };
        let Some(result) = latest.result.filter(|r| r.requires_rework()) else {
            return Ok(None);
        };

        let catalog = self.stages_for(batch.method_id).await?;
        let (rework, reason, recommendations) = match latest.encoded_failure() {
            Some(failure) => {
                let reason = failure.failure_details.clone();
                let recommendations = failure.recommendations.clone();
                (ActiveRework::Encoded(failure), reason, recommendations)
            }
            None => {
                let reason = if latest.comments.trim().is_empty() {
                    latest.detailed_feedback.clone()
                } else {
                    latest.comments.clone()
                };
                (
                    ActiveRework::Unspecified,
                    reason,
                    latest.recommendations.clone(),
                )
            }
        };
        let stage_to_redo = stage_advancer::rework_target(catalog.stages(), &rework).clone();

        Ok(Some(RetryGuidance {
            evaluation_id: latest.id,
            result,
            stage_to_redo,
            reason,
            recommendations,
        }))
    }

    /// Finalized evaluations, newest first.
    pub async fn evaluation_history(
        &self,
        batch_id: DbId,
    ) -> Result<Vec<EvaluationOutcome>, CoreError> {
        self.batch(batch_id).await?;
        self.store.list_evaluations(batch_id).await
    }

    pub async fn pending_evaluation(
        &self,
        batch_id: DbId,
    ) -> Result<Option<EvaluationOutcome>, CoreError> {
        self.batch(batch_id).await?;
        self.store.get_pending_evaluation(batch_id).await
    }

    /// Progress records ordered by step index.
    pub async fn progress_for(&self, batch_id: DbId) -> Result<Vec<ProgressRecord>, CoreError> {
        self.batch(batch_id).await?;
        self.store.list_progress(batch_id).await
    }

    /// Update the notes or media of an existing record.
    pub async fn update_progress_notes(
        &self,
        progress_id: DbId,
        patch: &UpdateProgressNotes,
    ) -> Result<ProgressRecord, CoreError> {
        progress::validate_notes_update(patch)?;
        self.store
            .update_progress_notes(progress_id, patch)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ProgressRecord",
                id: progress_id,
            })
    }

    /// Cancel a batch from any status other than `Cancelled`.
    pub async fn cancel(&self, batch_id: DbId) -> Result<ProcessingBatch, CoreError> {
        let batch = self.batch(batch_id).await?;
        batch::ensure_can_cancel(batch.status)?;
        let cancelled = self
            .store
            .set_batch_status(batch_id, BatchStatus::Cancelled)
            .await?;
        tracing::info!(batch_id, from = ?batch.status, "Batch cancelled");
        Ok(cancelled)
    }
}
