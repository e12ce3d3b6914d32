//! Handlers for batch evaluations.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use coffeetrace_core::evaluation::{EvaluationResult, EvaluationSubmission};
use coffeetrace_core::stage_catalog::StageRef;
use coffeetrace_core::types::DbId;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /batches/{batch_id}/evaluations`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitEvaluationRequest {
    pub result: EvaluationResult,
    /// Required (non-empty) for `fail`.
    #[serde(default)]
    pub problematic_stages: Vec<StageRef>,
    #[validate(length(max = 10000))]
    pub failure_details: Option<String>,
    #[validate(length(max = 10000))]
    pub comments: Option<String>,
    #[validate(length(max = 10000))]
    pub detailed_feedback: Option<String>,
    #[validate(length(max = 10000))]
    pub recommendations: Option<String>,
    pub evaluated_by: DbId,
}

impl From<SubmitEvaluationRequest> for EvaluationSubmission {
    fn from(req: SubmitEvaluationRequest) -> Self {
        EvaluationSubmission {
            result: req.result,
            problematic_stages: req.problematic_stages,
            failure_details: req.failure_details,
            comments: req.comments,
            detailed_feedback: req.detailed_feedback,
            recommendations: req.recommendations,
            evaluated_by: req.evaluated_by,
        }
    }
}

/// GET /api/v1/batches/{batch_id}/evaluations
///
/// Finalized evaluations, newest first.
pub async fn list_evaluations(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let history = state.engine.evaluation_history(batch_id).await?;
    Ok(Json(DataResponse { data: history }))
}

/// GET /api/v1/batches/{batch_id}/evaluations/pending
pub async fn get_pending_evaluation(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let pending = state.engine.pending_evaluation(batch_id).await?;
    Ok(Json(DataResponse { data: pending }))
}

/// POST /api/v1/batches/{batch_id}/evaluations
///
/// Finalizes the pending evaluation. 400 with `problematic stage required`
/// when a `fail` verdict names no stage.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
    Json(input): Json<SubmitEvaluationRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let submission = EvaluationSubmission::from(input);
    let outcome = state
        .engine
        .submit_evaluation(batch_id, &submission)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}
