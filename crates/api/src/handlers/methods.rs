//! Handlers for processing methods and their stage catalogs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use coffeetrace_core::stage_catalog::{self, Stage};
use coffeetrace_core::types::DbId;
use coffeetrace_db::models::processing_method::{
    CreateProcessingMethod, CreateStage, ProcessingMethod,
};
use coffeetrace_db::repositories::ProcessingMethodRepo;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /methods`. Stages are listed in processing order.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMethodRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub stages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MethodWithStages {
    #[serde(flatten)]
    pub method: ProcessingMethod,
    pub stages: Vec<Stage>,
}

/// POST /api/v1/methods
pub async fn create_method(
    State(state): State<AppState>,
    Json(input): Json<CreateMethodRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    for name in &input.stages {
        stage_catalog::validate_stage_name(name)?;
    }

    let create = CreateProcessingMethod {
        name: input.name,
        description: input.description,
        stages: input
            .stages
            .into_iter()
            .map(|name| CreateStage {
                name,
                is_required: None,
            })
            .collect(),
    };
    let (method, rows) = ProcessingMethodRepo::create(&state.pool, &create).await?;
    tracing::info!(method_id = method.id, stages = rows.len(), "Processing method created");

    let data = MethodWithStages {
        method,
        stages: rows.into_iter().map(Stage::from).collect(),
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// GET /api/v1/methods/{method_id}/stages
///
/// Ordered stage catalog; 404 when the method has no stages.
pub async fn list_stages(
    State(state): State<AppState>,
    Path(method_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let catalog = state.engine.stages_for(method_id).await?;
    Ok(Json(DataResponse {
        data: catalog.stages().to_vec(),
    }))
}
