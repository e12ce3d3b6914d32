//! Handlers for processing batches: lookup, creation, next stage, retry
//! guidance and cancel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use coffeetrace_core::batch::ProcessingBatch;
use coffeetrace_core::types::DbId;
use coffeetrace_db::models::batch::CreateBatch;
use coffeetrace_db::repositories::BatchRepo;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /batches`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    pub method_id: DbId,
    #[validate(range(min = 0.0))]
    pub total_input_quantity: f64,
}

/// POST /api/v1/batches
///
/// Registers a batch in `not_started`. The method must have a valid catalog.
pub async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<CreateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    state.engine.stages_for(input.method_id).await?;

    let row = BatchRepo::create(
        &state.pool,
        &CreateBatch {
            method_id: input.method_id,
            total_input_quantity: input.total_input_quantity,
        },
    )
    .await?;
    let batch = ProcessingBatch::try_from(row)?;
    tracing::info!(batch_id = batch.id, method_id = batch.method_id, "Batch created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: batch })))
}

/// GET /api/v1/batches/{batch_id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.engine.batch(batch_id).await?;
    Ok(Json(DataResponse { data: batch }))
}

/// GET /api/v1/batches/{batch_id}/next-stage
pub async fn next_stage(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let next = state.engine.next_stage(batch_id).await?;
    Ok(Json(DataResponse { data: next }))
}

/// GET /api/v1/batches/{batch_id}/retry-guidance
///
/// `data` is null unless the latest verdict asks for rework.
pub async fn retry_guidance(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let guidance = state.engine.retry_guidance(batch_id).await?;
    Ok(Json(DataResponse { data: guidance }))
}

/// POST /api/v1/batches/{batch_id}/cancel
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.engine.cancel(batch_id).await?;
    Ok(Json(DataResponse { data: batch }))
}
