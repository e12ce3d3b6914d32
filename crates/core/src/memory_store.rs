//! In-process [`ProgressionStore`] backed by a mutex-guarded state.
//!
//! Used by engine tests and by tools that replay batch histories without a
//! database. Commit units run under one lock acquisition, so they are atomic
//! with respect to every other call on the same store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::batch::ProcessingBatch;
use crate::error::CoreError;
use crate::evaluation::{EvaluationOutcome, NewPendingEvaluation};
use crate::progress::{ProgressRecord, UpdateProgressNotes};
use crate::stage_catalog::{self, Stage};
use crate::status::BatchStatus;
use crate::store::{
    BatchStore, EvaluationCommit, EvaluationStore, ProgressCommit, ProgressStore,
    ProgressionStore, StageLookup,
};
use crate::types::DbId;

#[derive(Debug, Default)]
struct State {
    next_id: DbId,
    stages: Vec<Stage>,
    batches: HashMap<DbId, ProcessingBatch>,
    progress: Vec<ProgressRecord>,
    evaluations: Vec<EvaluationOutcome>,
}

impl State {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn batch_mut(&mut self, batch_id: DbId) -> Result<&mut ProcessingBatch, CoreError> {
        self.batches.get_mut(&batch_id).ok_or(CoreError::NotFound {
            entity: "ProcessingBatch",
            id: batch_id,
        })
    }

    fn check_version(&self, batch_id: DbId, expected: i32) -> Result<(), CoreError> {
        let batch = self.batches.get(&batch_id).ok_or(CoreError::NotFound {
            entity: "ProcessingBatch",
            id: batch_id,
        })?;
        if batch.version != expected {
            return Err(CoreError::Conflict(format!(
                "Batch {batch_id} was modified concurrently (expected version {expected}, found {})",
                batch.version
            )));
        }
        Ok(())
    }

    fn push_pending(&mut self, pending: &NewPendingEvaluation) -> Result<(), CoreError> {
        let already_open = self
            .evaluations
            .iter()
            .any(|e| e.batch_id == pending.batch_id && e.is_pending());
        if already_open {
            return Err(CoreError::Conflict(format!(
                "Batch {} already has a pending evaluation",
                pending.batch_id
            )));
        }
        let now = Utc::now();
        let id = self.allocate_id();
        self.evaluations.push(EvaluationOutcome {
            id,
            batch_id: pending.batch_id,
            result: None,
            comments: String::new(),
            detailed_feedback: String::new(),
            recommendations: String::new(),
            checkpoint_step_index: pending.checkpoint_step_index,
            evaluated_at: None,
            evaluated_by: None,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processing method with stages named in order.
    pub async fn add_method(&self, stage_names: &[&str]) -> Result<(DbId, Vec<Stage>), CoreError> {
        for name in stage_names {
            stage_catalog::validate_stage_name(name)?;
        }
        let mut state = self.state.lock().await;
        let method_id = state.allocate_id();
        let mut stages = Vec::with_capacity(stage_names.len());
        for (pos, name) in stage_names.iter().enumerate() {
            let stage = Stage {
                id: state.allocate_id(),
                method_id,
                order_index: pos as i32 + 1,
                name: (*name).to_string(),
                is_required: true,
            };
            state.stages.push(stage.clone());
            stages.push(stage);
        }
        Ok((method_id, stages))
    }

    /// Register a new, not-started batch.
    pub async fn add_batch(&self, method_id: DbId, total_input_quantity: f64) -> ProcessingBatch {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let batch = ProcessingBatch {
            id: state.allocate_id(),
            method_id,
            status: BatchStatus::NotStarted,
            current_stage_id: None,
            total_input_quantity,
            total_output_quantity: 0.0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.batches.insert(batch.id, batch.clone());
        batch
    }
}

#[async_trait]
impl StageLookup for InMemoryStore {
    async fn get_stages_for_method(&self, method_id: DbId) -> Result<Vec<Stage>, CoreError> {
        let state = self.state.lock().await;
        let mut stages: Vec<Stage> = state
            .stages
            .iter()
            .filter(|s| s.method_id == method_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.order_index);
        Ok(stages)
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn list_progress(&self, batch_id: DbId) -> Result<Vec<ProgressRecord>, CoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<ProgressRecord> = state
            .progress
            .iter()
            .filter(|r| r.batch_id == batch_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.step_index);
        Ok(records)
    }

    async fn find_progress(&self, progress_id: DbId) -> Result<Option<ProgressRecord>, CoreError> {
        let state = self.state.lock().await;
        Ok(state.progress.iter().find(|r| r.id == progress_id).cloned())
    }

    async fn update_progress_notes(
        &self,
        progress_id: DbId,
        patch: &UpdateProgressNotes,
    ) -> Result<Option<ProgressRecord>, CoreError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.progress.iter_mut().find(|r| r.id == progress_id) else {
            return Ok(None);
        };
        if let Some(notes) = &patch.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(refs) = &patch.media_refs {
            record.media_refs = refs.clone();
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl EvaluationStore for InMemoryStore {
    async fn get_pending_evaluation(
        &self,
        batch_id: DbId,
    ) -> Result<Option<EvaluationOutcome>, CoreError> {
        let state = self.state.lock().await;
        Ok(state
            .evaluations
            .iter()
            .find(|e| e.batch_id == batch_id && e.is_pending())
            .cloned())
    }

    async fn list_evaluations(&self, batch_id: DbId) -> Result<Vec<EvaluationOutcome>, CoreError> {
        let state = self.state.lock().await;
        let mut history: Vec<EvaluationOutcome> = state
            .evaluations
            .iter()
            .filter(|e| e.batch_id == batch_id && !e.is_pending())
            .cloned()
            .collect();
        history.sort_by(|a, b| b.evaluated_at.cmp(&a.evaluated_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }
}

#[async_trait]
impl BatchStore for InMemoryStore {
    async fn get_batch(&self, batch_id: DbId) -> Result<Option<ProcessingBatch>, CoreError> {
        let state = self.state.lock().await;
        Ok(state.batches.get(&batch_id).cloned())
    }

    async fn set_batch_status(
        &self,
        batch_id: DbId,
        status: BatchStatus,
    ) -> Result<ProcessingBatch, CoreError> {
        let mut state = self.state.lock().await;
        let batch = state.batch_mut(batch_id)?;
        batch.status = status;
        batch.version += 1;
        batch.updated_at = Utc::now();
        Ok(batch.clone())
    }
}

#[async_trait]
impl ProgressionStore for InMemoryStore {
    async fn commit_progress(&self, commit: &ProgressCommit) -> Result<ProgressRecord, CoreError> {
        let mut state = self.state.lock().await;
        let batch_id = commit.record.batch_id;
        state.check_version(batch_id, commit.expected_version)?;

        if let Some(pending) = &commit.open_evaluation {
            state.push_pending(pending)?;
        }

        let now = Utc::now();
        let new = &commit.record;
        let record = ProgressRecord {
            id: state.allocate_id(),
            batch_id,
            stage_id: new.stage_id,
            stage_name: new.stage_name.clone(),
            step_index: new.step_index,
            progress_date: new.progress_date,
            output_quantity: new.output_quantity,
            output_unit: new.output_unit.clone(),
            notes: new.notes.clone(),
            media_refs: new.media_refs.clone(),
            created_at: now,
            updated_at: now,
        };
        state.progress.push(record.clone());

        let batch = state.batch_mut(batch_id)?;
        batch.status = commit.status;
        batch.current_stage_id = Some(new.stage_id);
        batch.total_output_quantity = new.output_quantity;
        batch.version += 1;
        batch.updated_at = now;

        Ok(record)
    }

    async fn commit_evaluation(
        &self,
        commit: &EvaluationCommit,
    ) -> Result<EvaluationOutcome, CoreError> {
        let mut state = self.state.lock().await;
        state.check_version(commit.batch_id, commit.expected_version)?;

        let now = Utc::now();
        let patch = &commit.patch;
        let idx = state
            .evaluations
            .iter()
            .position(|e| e.id == commit.evaluation_id && e.batch_id == commit.batch_id)
            .ok_or(CoreError::NotFound {
                entity: "EvaluationOutcome",
                id: commit.evaluation_id,
            })?;
        if !state.evaluations[idx].is_pending() {
            return Err(CoreError::Conflict(format!(
                "Evaluation {} has already been finalized",
                commit.evaluation_id
            )));
        }
        let other_pending = state
            .evaluations
            .iter()
            .enumerate()
            .any(|(i, e)| i != idx && e.batch_id == commit.batch_id && e.is_pending());
        if commit.reopen_evaluation.is_some() && other_pending {
            return Err(CoreError::Conflict(format!(
                "Batch {} already has another pending evaluation",
                commit.batch_id
            )));
        }

        let finalized = {
            let outcome = &mut state.evaluations[idx];
            outcome.result = Some(patch.result);
            outcome.comments = patch.comments.clone();
            outcome.detailed_feedback = patch.detailed_feedback.clone();
            outcome.recommendations = patch.recommendations.clone();
            outcome.evaluated_at = Some(patch.evaluated_at);
            outcome.evaluated_by = Some(patch.evaluated_by);
            outcome.updated_at = now;
            outcome.clone()
        };

        if let Some(pending) = &commit.reopen_evaluation {
            state.push_pending(pending)?;
        }

        let batch = state.batch_mut(commit.batch_id)?;
        batch.status = commit.status;
        batch.version += 1;
        batch.updated_at = now;

        Ok(finalized)
    }
}
