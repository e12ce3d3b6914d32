//! Repository for the `stages` table.

use coffeetrace_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::stage::StageRow;

/// Column list for `stages` queries.
const COLUMNS: &str = "id, method_id, order_index, name, is_required, created_at, updated_at";

/// Provides read and insert operations for method stages.
pub struct StageRepo;

impl StageRepo {
    /// Insert one stage. Called by [`super::ProcessingMethodRepo::create`].
    pub async fn insert(
        conn: &mut PgConnection,
        method_id: DbId,
        order_index: i32,
        name: &str,
        is_required: bool,
    ) -> Result<StageRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO stages (method_id, order_index, name, is_required) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StageRow>(&query)
            .bind(method_id)
            .bind(order_index)
            .bind(name)
            .bind(is_required)
            .fetch_one(conn)
            .await
    }

    /// All stages of a method, ordered by `order_index` ascending.
    pub async fn list_by_method(
        pool: &PgPool,
        method_id: DbId,
    ) -> Result<Vec<StageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stages \
             WHERE method_id = $1 ORDER BY order_index ASC"
        );
        sqlx::query_as::<_, StageRow>(&query)
            .bind(method_id)
            .fetch_all(pool)
            .await
    }
}
