//! Handlers for progress records.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use coffeetrace_core::progress::{ProgressData, UpdateProgressNotes};
use coffeetrace_core::stage_catalog::StageRef;
use coffeetrace_core::types::{DbId, Timestamp};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /batches/{batch_id}/progress`.
///
/// The stage is identified by any of `stage_id`, `stage_name` or
/// `order_index`; the engine resolves them in that order.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordProgressRequest {
    pub stage_id: Option<DbId>,
    pub stage_name: Option<String>,
    pub order_index: Option<i32>,
    /// Defaults to the time of the request.
    pub progress_date: Option<Timestamp>,
    #[validate(range(min = 0.0))]
    pub output_quantity: f64,
    #[validate(length(min = 1, max = 32))]
    pub output_unit: String,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub media_refs: Vec<String>,
}

/// Request body for `PATCH /progress/{progress_id}`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
    #[validate(length(max = 20))]
    pub media_refs: Option<Vec<String>>,
}

/// GET /api/v1/batches/{batch_id}/progress
pub async fn list_progress(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let records = state.engine.progress_for(batch_id).await?;
    Ok(Json(DataResponse { data: records }))
}

/// POST /api/v1/batches/{batch_id}/progress
///
/// 409 `ILLEGAL_TRANSITION` when the stage is not the one the batch must
/// record next; the client should re-query `next-stage`.
pub async fn record_progress(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
    Json(input): Json<RecordProgressRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let choice = StageRef {
        stage_id: input.stage_id,
        name: input.stage_name,
        order_index: input.order_index,
    };
    if choice.is_empty() {
        return Err(AppError::BadRequest(
            "One of stage_id, stage_name or order_index is required".into(),
        ));
    }

    let data = ProgressData {
        progress_date: input.progress_date.unwrap_or_else(Utc::now),
        output_quantity: input.output_quantity,
        output_unit: input.output_unit,
        notes: input.notes,
        media_refs: input.media_refs,
    };
    let outcome = state.engine.record_progress(batch_id, &choice, data).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// PATCH /api/v1/progress/{progress_id}
pub async fn update_progress(
    State(state): State<AppState>,
    Path(progress_id): Path<DbId>,
    Json(input): Json<UpdateProgressRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let patch = UpdateProgressNotes {
        notes: input.notes,
        media_refs: input.media_refs,
    };
    let record = state
        .engine
        .update_progress_notes(progress_id, &patch)
        .await?;
    Ok(Json(DataResponse { data: record }))
}
