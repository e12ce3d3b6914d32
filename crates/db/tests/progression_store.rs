//! Integration tests for the Postgres progression store.
//!
//! Runs the progression engine end to end against a real database:
//! - Method and stage catalog creation
//! - Progress commits with status, current stage and output quantity
//! - Pending evaluation uniqueness
//! - Fail verdict, retry override and completion
//! - Version-guarded commits

use assert_matches::assert_matches;
use chrono::Utc;
use coffeetrace_core::error::CoreError;
use coffeetrace_core::evaluation::{EvaluationResult, EvaluationSubmission, NewPendingEvaluation};
use coffeetrace_core::progress::{NewProgressRecord, ProgressData, UpdateProgressNotes};
use coffeetrace_core::progression::BatchProgressionEngine;
use coffeetrace_core::stage_catalog::StageRef;
use coffeetrace_core::status::BatchStatus;
use coffeetrace_core::store::{BatchStore, ProgressCommit, ProgressionStore};
use coffeetrace_db::models::batch::CreateBatch;
use coffeetrace_db::models::processing_method::{CreateProcessingMethod, CreateStage};
use coffeetrace_db::repositories::{BatchRepo, EvaluationRepo, ProcessingMethodRepo, StageRepo};
use coffeetrace_db::PgProgressionStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_batch(pool: &PgPool) -> i64 {
    let input = CreateProcessingMethod {
        name: "Washed".to_string(),
        description: None,
        stages: ["Harvest", "Dry", "Pack"]
            .into_iter()
            .map(|name| CreateStage {
                name: name.to_string(),
                is_required: None,
            })
            .collect(),
    };
    let (method, _) = ProcessingMethodRepo::create(pool, &input).await.unwrap();
    let batch = BatchRepo::create(
        pool,
        &CreateBatch {
            method_id: method.id,
            total_input_quantity: 1200.0,
        },
    )
    .await
    .unwrap();
    batch.id
}

fn data(quantity: f64) -> ProgressData {
    ProgressData {
        progress_date: Utc::now(),
        output_quantity: quantity,
        output_unit: "kg".to_string(),
        notes: Some("sunny".to_string()),
        media_refs: vec!["media/1.jpg".to_string()],
    }
}

fn fail_on(stage: &str) -> EvaluationSubmission {
    EvaluationSubmission {
        result: EvaluationResult::Fail,
        problematic_stages: vec![StageRef::by_name(stage)],
        failure_details: Some("Moisture: 14%".to_string()),
        comments: None,
        detailed_feedback: None,
        recommendations: Some("Dry two more days".to_string()),
        evaluated_by: 7,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_method_stages_are_ordered(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let batch = BatchRepo::find_by_id(&pool, batch_id).await.unwrap().unwrap();
    assert_eq!(batch.status_id, BatchStatus::NotStarted.id());
    assert_eq!(batch.version, 0);

    let stages = StageRepo::list_by_method(&pool, batch.method_id).await.unwrap();
    let orders: Vec<i32> = stages.iter().map(|s| s.order_index).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert!(stages.iter().all(|s| s.is_required));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_method_name_rejected(pool: PgPool) {
    seed_batch(&pool).await;
    let input = CreateProcessingMethod {
        name: "Washed".to_string(),
        description: None,
        stages: vec![],
    };
    let err = ProcessingMethodRepo::create(&pool, &input).await.unwrap_err();
    let db_err = err.as_database_error().unwrap();
    assert!(db_err.is_unique_violation());
    assert_eq!(db_err.constraint(), Some("uq_processing_methods_name"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stage_name_with_pipe_violates_check(pool: PgPool) {
    let input = CreateProcessingMethod {
        name: "Honey".to_string(),
        description: None,
        stages: ["Harvest", "Dry | Rest", "Pack"]
            .into_iter()
            .map(|name| CreateStage {
                name: name.to_string(),
                is_required: None,
            })
            .collect(),
    };
    let err = ProcessingMethodRepo::create(&pool, &input).await.unwrap_err();
    let db_err = err.as_database_error().unwrap();
    assert_eq!(db_err.constraint(), Some("ck_stages_name_no_pipe"));

    // The method row is rolled back together with its stages.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processing_methods")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_workflow_with_retry(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let engine = BatchProgressionEngine::new(PgProgressionStore::new(pool.clone()));

    for (name, qty) in [("Harvest", 1100.0), ("Dry", 600.0), ("Pack", 580.0)] {
        engine
            .record_progress(batch_id, &StageRef::by_name(name), data(qty))
            .await
            .unwrap();
    }

    let batch = engine.batch(batch_id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::AwaitingEvaluation);
    assert_eq!(batch.total_output_quantity, 580.0);
    assert_eq!(batch.version, 3);

    let records = engine.progress_for(batch_id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].media_refs, vec!["media/1.jpg".to_string()]);
    assert_eq!(batch.current_stage_id, Some(records[2].stage_id));

    let pending = engine.pending_evaluation(batch_id).await.unwrap().unwrap();
    assert_eq!(pending.checkpoint_step_index, 3);

    let outcome = engine
        .submit_evaluation(batch_id, &fail_on("Dry"))
        .await
        .unwrap();
    assert_eq!(outcome.id, pending.id);
    assert_eq!(outcome.result, Some(EvaluationResult::Fail));
    assert_eq!(
        outcome.comments,
        "FAILED_STAGE_ID:2|FAILED_STAGE_NAME:Dry|DETAILS:Moisture: 14%|RECOMMENDATIONS:Dry two more days"
    );

    let guidance = engine.retry_guidance(batch_id).await.unwrap().unwrap();
    assert_eq!(guidance.stage_to_redo.name, "Dry");
    assert_eq!(guidance.reason, "Moisture: 14%");

    assert_eq!(
        engine.next_stage(batch_id).await.unwrap().stage().unwrap().name,
        "Dry"
    );
    engine
        .record_progress(batch_id, &StageRef::by_name("Dry"), data(590.0))
        .await
        .unwrap();
    let back = engine
        .record_progress(batch_id, &StageRef::by_name("Pack"), data(570.0))
        .await
        .unwrap();
    assert_eq!(back.status, BatchStatus::AwaitingEvaluation);

    let pass = EvaluationSubmission {
        result: EvaluationResult::Pass,
        problematic_stages: vec![],
        failure_details: None,
        comments: Some("Clean cup".to_string()),
        detailed_feedback: None,
        recommendations: None,
        evaluated_by: 7,
    };
    engine.submit_evaluation(batch_id, &pass).await.unwrap();
    assert_eq!(
        engine.batch(batch_id).await.unwrap().status,
        BatchStatus::Completed
    );

    let history = engine.evaluation_history(batch_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].comments, "Clean cup");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_temporary_reopens_pending(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let engine = BatchProgressionEngine::new(PgProgressionStore::new(pool.clone()));
    for name in ["Harvest", "Dry", "Pack"] {
        engine
            .record_progress(batch_id, &StageRef::by_name(name), data(100.0))
            .await
            .unwrap();
    }
    let first = engine.pending_evaluation(batch_id).await.unwrap().unwrap();

    let temporary = EvaluationSubmission {
        result: EvaluationResult::Temporary,
        problematic_stages: vec![],
        failure_details: None,
        comments: Some("Resting, cup again next week".to_string()),
        detailed_feedback: None,
        recommendations: None,
        evaluated_by: 7,
    };
    engine.submit_evaluation(batch_id, &temporary).await.unwrap();

    let second = engine.pending_evaluation(batch_id).await.unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(second.checkpoint_step_index, 3);
    assert_eq!(
        engine.batch(batch_id).await.unwrap().status,
        BatchStatus::AwaitingEvaluation
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_pending_evaluation_violates_unique_index(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let pending = NewPendingEvaluation {
        batch_id,
        checkpoint_step_index: 1,
    };
    let mut conn = pool.acquire().await.unwrap();
    EvaluationRepo::open_pending(&mut *conn, &pending).await.unwrap();
    let err = EvaluationRepo::open_pending(&mut *conn, &pending)
        .await
        .unwrap_err();
    assert_eq!(
        err.as_database_error().unwrap().constraint(),
        Some("uq_evaluations_one_pending_per_batch")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_version_commit_conflicts_and_rolls_back(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let store = PgProgressionStore::new(pool.clone());
    let stages = StageRepo::list_by_method(
        &pool,
        store.get_batch(batch_id).await.unwrap().unwrap().method_id,
    )
    .await
    .unwrap();

    let commit = |expected_version| ProgressCommit {
        expected_version,
        record: NewProgressRecord {
            batch_id,
            stage_id: stages[0].id,
            stage_name: stages[0].name.clone(),
            step_index: 1,
            progress_date: Utc::now(),
            output_quantity: 10.0,
            output_unit: "kg".to_string(),
            notes: None,
            media_refs: vec![],
        },
        status: BatchStatus::InProgress,
        open_evaluation: None,
    };

    store.commit_progress(&commit(0)).await.unwrap();
    assert_matches!(
        store.commit_progress(&commit(0)).await,
        Err(CoreError::Conflict(_))
    );

    let batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.version, 1);
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM progress_records WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count.0, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_notes_update_keeps_absent_fields(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let engine = BatchProgressionEngine::new(PgProgressionStore::new(pool.clone()));
    let outcome = engine
        .record_progress(batch_id, &StageRef::by_order_index(1), data(50.0))
        .await
        .unwrap();

    let patch = UpdateProgressNotes {
        notes: Some("Picked late afternoon".to_string()),
        media_refs: None,
    };
    let updated = engine
        .update_progress_notes(outcome.record.id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Picked late afternoon"));
    assert_eq!(updated.media_refs, vec!["media/1.jpg".to_string()]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_sets_status(pool: PgPool) {
    let batch_id = seed_batch(&pool).await;
    let engine = BatchProgressionEngine::new(PgProgressionStore::new(pool.clone()));
    let cancelled = engine.cancel(batch_id).await.unwrap();
    assert_eq!(cancelled.status, BatchStatus::Cancelled);
    assert_eq!(cancelled.version, 1);
}
