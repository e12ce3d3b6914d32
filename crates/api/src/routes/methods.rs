use axum::routing::{get, post};
use axum::Router;

use crate::handlers::methods;
use crate::state::AppState;

/// Routes mounted at `/methods`.
///
/// ```text
/// POST   /                        -> create_method
/// GET    /{method_id}/stages      -> list_stages
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(methods::create_method))
        .route("/{method_id}/stages", get(methods::list_stages))
}
