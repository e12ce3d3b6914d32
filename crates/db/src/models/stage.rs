//! Stage rows.

use coffeetrace_core::stage_catalog::Stage;
use coffeetrace_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `stages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StageRow {
    pub id: DbId,
    pub method_id: DbId,
    pub order_index: i32,
    pub name: String,
    pub is_required: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<StageRow> for Stage {
    fn from(row: StageRow) -> Self {
        Stage {
            id: row.id,
            method_id: row.method_id,
            order_index: row.order_index,
            name: row.name,
            is_required: row.is_required,
        }
    }
}
