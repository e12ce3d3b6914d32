//! HTTP-level integration tests for batch progression and evaluation.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, patch_json, post_json, seed_batch};
use serde_json::json;
use sqlx::PgPool;

async fn record(pool: &PgPool, batch_id: i64, stage_name: &str) -> serde_json::Value {
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/batches/{batch_id}/progress"),
        json!({"stage_name": stage_name, "output_quantity": 500.0, "output_unit": "kg"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "recording {stage_name}");
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Catalog and batch lookup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stage_catalog_is_ordered(pool: PgPool) {
    let (method_id, _) = seed_batch(&pool).await;

    let response = get(
        build_test_app(pool),
        &format!("/api/v1/methods/{method_id}/stages"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Harvest", "Dry", "Pack"]);
    assert_eq!(json["data"][1]["order_index"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stage_name_with_pipe_returns_400(pool: PgPool) {
    let response = post_json(
        build_test_app(pool),
        "/api/v1/methods",
        json!({"name": "Honey", "stages": ["Harvest", "Dry | Rest", "Pack"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("Dry | Rest"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_method_stages_returns_404(pool: PgPool) {
    let response = get(build_test_app(pool), "/api/v1/methods/999999/stages").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_new_batch_is_not_started(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;

    let response = get(build_test_app(pool), &format!("/api/v1/batches/{batch_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "not_started");
    assert_eq!(json["data"]["total_input_quantity"], 900.0);
    assert!(json["data"]["current_stage_id"].is_null());
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_next_stage_after_harvest_is_dry(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/batches/{batch_id}/next-stage"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["kind"], "stage");
    assert_eq!(json["data"]["stage"]["name"], "Harvest");

    let recorded = record(&pool, batch_id, "Harvest").await;
    assert_eq!(recorded["data"]["status"], "in_progress");
    assert_eq!(recorded["data"]["record"]["step_index"], 1);

    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/batches/{batch_id}/next-stage"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["stage"]["name"], "Dry");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_skipping_a_stage_returns_illegal_transition(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/batches/{batch_id}/progress"),
        json!({"order_index": 3, "output_quantity": 10.0, "output_unit": "kg"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ILLEGAL_TRANSITION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_without_stage_returns_400(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/batches/{batch_id}/progress"),
        json!({"output_quantity": 10.0, "output_unit": "kg"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_negative_quantity_fails_validation(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/batches/{batch_id}/progress"),
        json!({"stage_name": "Harvest", "output_quantity": -1.0, "output_unit": "kg"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_progress_notes(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;
    let recorded = record(&pool, batch_id, "Harvest").await;
    let progress_id = recorded["data"]["record"]["id"].as_i64().unwrap();

    let response = patch_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/progress/{progress_id}"),
        json!({"notes": "Cherries 95% ripe", "media_refs": ["media/harvest.jpg"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["notes"], "Cherries 95% ripe");
    assert_eq!(json["data"]["media_refs"][0], "media/harvest.jpg");

    let response = patch_json(
        build_test_app(pool),
        "/api/v1/progress/999999",
        json!({"notes": "nothing"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Evaluation and retry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fail_on_dry_then_retry_then_pass(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;
    for stage in ["Harvest", "Dry", "Pack"] {
        record(&pool, batch_id, stage).await;
    }

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/batches/{batch_id}/evaluations/pending"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["checkpoint_step_index"], 3);
    assert!(json["data"]["result"].is_null());

    // Fail without a stage is rejected verbatim.
    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/batches/{batch_id}/evaluations"),
        json!({"result": "fail", "evaluated_by": 3}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "problematic stage required");

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/batches/{batch_id}/evaluations"),
        json!({
            "result": "fail",
            "problematic_stages": [{"name": "Dry"}],
            "failure_details": "Moisture 14%",
            "recommendations": "Dry two more days",
            "evaluated_by": 3
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["data"]["comments"],
        "FAILED_STAGE_ID:2|FAILED_STAGE_NAME:Dry|DETAILS:Moisture 14%|RECOMMENDATIONS:Dry two more days"
    );

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/batches/{batch_id}"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["status"], "in_progress");

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/batches/{batch_id}/retry-guidance"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["stage_to_redo"]["name"], "Dry");
    assert_eq!(json["data"]["reason"], "Moisture 14%");

    record(&pool, batch_id, "Dry").await;
    let back = record(&pool, batch_id, "Pack").await;
    assert_eq!(back["data"]["status"], "awaiting_evaluation");

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/batches/{batch_id}/evaluations"),
        json!({"result": "pass", "comments": "Bright and clean", "evaluated_by": 3}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/batches/{batch_id}/evaluations"),
        )
        .await,
    )
    .await;
    let history = json["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["result"], "pass");
    assert_eq!(history[1]["result"], "fail");

    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/batches/{batch_id}/retry-guidance"),
        )
        .await,
    )
    .await;
    assert!(json["data"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_evaluation_before_checkpoint_is_illegal(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;
    record(&pool, batch_id, "Harvest").await;

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/batches/{batch_id}/evaluations"),
        json!({"result": "pass", "evaluated_by": 3}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ILLEGAL_TRANSITION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_twice_is_illegal(pool: PgPool) {
    let (_, batch_id) = seed_batch(&pool).await;
    let uri = format!("/api/v1/batches/{batch_id}/cancel");

    let response = post_json(build_test_app(pool.clone()), &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");

    let response = post_json(build_test_app(pool), &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Failure comment decoding
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_decode_failure_comment(pool: PgPool) {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/failure-comments/decode",
        json!({"comments": "FAILED_STAGE_ID:2|FAILED_STAGE_NAME:Dry|DETAILS:wet|RECOMMENDATIONS:wait"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["failure"]["failed_order_index"], 2);
    assert_eq!(json["data"]["failure"]["failed_stage_name"], "Dry");

    let json = body_json(
        post_json(
            build_test_app(pool),
            "/api/v1/failure-comments/decode",
            json!({"comments": "random free text"}),
        )
        .await,
    )
    .await;
    assert!(json["data"]["failure"].is_null());
    assert_eq!(json["data"]["summary"], "random free text");
}
