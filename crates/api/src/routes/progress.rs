use axum::routing::patch;
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;

/// Routes mounted at `/progress`.
///
/// ```text
/// PATCH  /{progress_id}           -> update_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{progress_id}", patch(progress::update_progress))
}
