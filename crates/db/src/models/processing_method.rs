//! Processing method models and DTOs.

use coffeetrace_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `processing_methods` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingMethod {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a method together with its ordered stages.
///
/// Stage order indices are assigned 1..N from the order of `stages`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProcessingMethod {
    pub name: String,
    pub description: Option<String>,
    pub stages: Vec<CreateStage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStage {
    pub name: String,
    /// Defaults to `true`.
    pub is_required: Option<bool>,
}
