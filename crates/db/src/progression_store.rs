//! PostgreSQL implementation of the progression engine's store traits.
//!
//! Each commit unit runs in one transaction. The batch row is updated first
//! with a `version` guard, which both detects stale decisions and holds the
//! row lock until commit, so concurrent commits on one batch serialize.

use async_trait::async_trait;
use coffeetrace_core::batch::ProcessingBatch;
use coffeetrace_core::error::CoreError;
use coffeetrace_core::evaluation::EvaluationOutcome;
use coffeetrace_core::progress::{ProgressRecord, UpdateProgressNotes};
use coffeetrace_core::stage_catalog::Stage;
use coffeetrace_core::status::BatchStatus;
use coffeetrace_core::store::{
    BatchStore, EvaluationCommit, EvaluationStore, ProgressCommit, ProgressStore,
    ProgressionStore, StageLookup,
};
use coffeetrace_core::types::DbId;
use sqlx::PgPool;

use crate::repositories::{BatchRepo, EvaluationRepo, ProgressRepo, StageRepo};

/// Unique constraints whose violation means another writer got there first.
const CONFLICT_CONSTRAINTS: &[&str] = &[
    "uq_evaluations_one_pending_per_batch",
    "uq_progress_records_batch_step",
];

/// Map a sqlx error into the domain error space.
fn db_error(err: sqlx::Error) -> CoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            if let Some(constraint) = db_err.constraint() {
                if CONFLICT_CONSTRAINTS.contains(&constraint) {
                    return CoreError::Conflict(format!(
                        "Concurrent write rejected by {constraint}"
                    ));
                }
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(err.to_string())
}

fn stale_batch(batch_id: DbId, expected_version: i32) -> CoreError {
    CoreError::Conflict(format!(
        "Batch {batch_id} was modified concurrently (expected version {expected_version})"
    ))
}

/// [`ProgressionStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgProgressionStore {
    pool: PgPool,
}

impl PgProgressionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StageLookup for PgProgressionStore {
    async fn get_stages_for_method(&self, method_id: DbId) -> Result<Vec<Stage>, CoreError> {
        let rows = StageRepo::list_by_method(&self.pool, method_id)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Stage::from).collect())
    }
}

#[async_trait]
impl ProgressStore for PgProgressionStore {
    async fn list_progress(&self, batch_id: DbId) -> Result<Vec<ProgressRecord>, CoreError> {
        let rows = ProgressRepo::list_by_batch(&self.pool, batch_id)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ProgressRecord::from).collect())
    }

    async fn find_progress(&self, progress_id: DbId) -> Result<Option<ProgressRecord>, CoreError> {
        let row = ProgressRepo::find_by_id(&self.pool, progress_id)
            .await
            .map_err(db_error)?;
        Ok(row.map(ProgressRecord::from))
    }

    async fn update_progress_notes(
        &self,
        progress_id: DbId,
        patch: &UpdateProgressNotes,
    ) -> Result<Option<ProgressRecord>, CoreError> {
        let row = ProgressRepo::update_notes(&self.pool, progress_id, patch)
            .await
            .map_err(db_error)?;
        Ok(row.map(ProgressRecord::from))
    }
}

#[async_trait]
impl EvaluationStore for PgProgressionStore {
    async fn get_pending_evaluation(
        &self,
        batch_id: DbId,
    ) -> Result<Option<EvaluationOutcome>, CoreError> {
        EvaluationRepo::find_pending(&self.pool, batch_id)
            .await
            .map_err(db_error)?
            .map(EvaluationOutcome::try_from)
            .transpose()
    }

    async fn list_evaluations(&self, batch_id: DbId) -> Result<Vec<EvaluationOutcome>, CoreError> {
        EvaluationRepo::list_finalized(&self.pool, batch_id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(EvaluationOutcome::try_from)
            .collect()
    }
}

#[async_trait]
impl BatchStore for PgProgressionStore {
    async fn get_batch(&self, batch_id: DbId) -> Result<Option<ProcessingBatch>, CoreError> {
        BatchRepo::find_by_id(&self.pool, batch_id)
            .await
            .map_err(db_error)?
            .map(ProcessingBatch::try_from)
            .transpose()
    }

    async fn set_batch_status(
        &self,
        batch_id: DbId,
        status: BatchStatus,
    ) -> Result<ProcessingBatch, CoreError> {
        BatchRepo::set_status(&self.pool, batch_id, status)
            .await
            .map_err(db_error)?
            .ok_or(CoreError::NotFound {
                entity: "ProcessingBatch",
                id: batch_id,
            })?
            .try_into()
    }
}

#[async_trait]
impl ProgressionStore for PgProgressionStore {
    async fn commit_progress(&self, commit: &ProgressCommit) -> Result<ProgressRecord, CoreError> {
        let batch_id = commit.record.batch_id;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        BatchRepo::apply_progress(
            &mut *tx,
            batch_id,
            commit.expected_version,
            commit.status,
            commit.record.stage_id,
            commit.record.output_quantity,
        )
        .await
        .map_err(db_error)?
        .ok_or_else(|| stale_batch(batch_id, commit.expected_version))?;

        let row = ProgressRepo::insert(&mut *tx, &commit.record)
            .await
            .map_err(db_error)?;

        if let Some(pending) = &commit.open_evaluation {
            EvaluationRepo::open_pending(&mut *tx, pending)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    async fn commit_evaluation(
        &self,
        commit: &EvaluationCommit,
    ) -> Result<EvaluationOutcome, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        BatchRepo::apply_status(
            &mut *tx,
            commit.batch_id,
            commit.expected_version,
            commit.status,
        )
        .await
        .map_err(db_error)?
        .ok_or_else(|| stale_batch(commit.batch_id, commit.expected_version))?;

        let row = EvaluationRepo::finalize(
            &mut *tx,
            commit.evaluation_id,
            commit.batch_id,
            &commit.patch,
        )
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            CoreError::Conflict(format!(
                "Evaluation {} is no longer pending",
                commit.evaluation_id
            ))
        })?;

        if let Some(pending) = &commit.reopen_evaluation {
            EvaluationRepo::open_pending(&mut *tx, pending)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        row.try_into()
    }
}
