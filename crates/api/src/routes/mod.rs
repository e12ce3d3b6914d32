pub mod batches;
pub mod health;
pub mod methods;
pub mod progress;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /methods                                         create (POST)
/// /methods/{method_id}/stages                      ordered catalog (GET)
///
/// /batches                                         create (POST)
/// /batches/{batch_id}                              get
/// /batches/{batch_id}/cancel                       cancel (POST)
/// /batches/{batch_id}/next-stage                   next stage or complete (GET)
/// /batches/{batch_id}/progress                     list, record (GET, POST)
/// /batches/{batch_id}/evaluations                  history, submit (GET, POST)
/// /batches/{batch_id}/evaluations/pending          pending evaluation (GET)
/// /batches/{batch_id}/retry-guidance               stage to redo (GET)
///
/// /progress/{progress_id}                          update notes/media (PATCH)
///
/// /failure-comments/decode                         decode a comment (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/methods", methods::router())
        .nest("/batches", batches::router())
        .nest("/progress", progress::router())
        .route(
            "/failure-comments/decode",
            post(handlers::failure_comments::decode_comment),
        )
}
