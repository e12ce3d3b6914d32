use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{batches, evaluations, progress};
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// POST   /                                    -> create_batch
/// GET    /{batch_id}                          -> get_batch
/// POST   /{batch_id}/cancel                   -> cancel_batch
/// GET    /{batch_id}/next-stage               -> next_stage
/// GET    /{batch_id}/progress                 -> list_progress
/// POST   /{batch_id}/progress                 -> record_progress
/// GET    /{batch_id}/evaluations              -> list_evaluations
/// POST   /{batch_id}/evaluations              -> submit_evaluation
/// GET    /{batch_id}/evaluations/pending      -> get_pending_evaluation
/// GET    /{batch_id}/retry-guidance           -> retry_guidance
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(batches::create_batch))
        .route("/{batch_id}", get(batches::get_batch))
        .route("/{batch_id}/cancel", post(batches::cancel_batch))
        .route("/{batch_id}/next-stage", get(batches::next_stage))
        .route(
            "/{batch_id}/progress",
            get(progress::list_progress).post(progress::record_progress),
        )
        .route(
            "/{batch_id}/evaluations",
            get(evaluations::list_evaluations).post(evaluations::submit_evaluation),
        )
        .route(
            "/{batch_id}/evaluations/pending",
            get(evaluations::get_pending_evaluation),
        )
        .route("/{batch_id}/retry-guidance", get(batches::retry_guidance))
}
