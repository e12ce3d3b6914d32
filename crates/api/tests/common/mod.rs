#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use coffeetrace_api::config::ServerConfig;
use coffeetrace_api::router::build_app_router;
use coffeetrace_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        db_max_connections: 5,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool. Shares [`build_app_router`] with `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState::new(pool, config.clone());
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create the Harvest / Dry / Pack method and a batch on it through the API.
/// Returns `(method_id, batch_id)`.
pub async fn seed_batch(pool: &PgPool) -> (i64, i64) {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/methods",
        serde_json::json!({"name": "Natural", "stages": ["Harvest", "Dry", "Pack"]}),
    )
    .await;
    let method = body_json(response).await;
    let method_id = method["data"]["id"].as_i64().unwrap();

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/batches",
        serde_json::json!({"method_id": method_id, "total_input_quantity": 900.0}),
    )
    .await;
    let batch = body_json(response).await;
    (method_id, batch["data"]["id"].as_i64().unwrap())
}
