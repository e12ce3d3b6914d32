//! Repository for the `processing_methods` table.

use coffeetrace_core::types::DbId;
use sqlx::PgPool;

use crate::models::processing_method::{CreateProcessingMethod, ProcessingMethod};
use crate::models::stage::StageRow;
use crate::repositories::StageRepo;

/// Column list for `processing_methods` queries.
const COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Provides CRUD operations for processing methods.
pub struct ProcessingMethodRepo;

impl ProcessingMethodRepo {
    /// Create a method and its stages in one transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateProcessingMethod,
    ) -> Result<(ProcessingMethod, Vec<StageRow>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO processing_methods (name, description) \
             VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        let method = sqlx::query_as::<_, ProcessingMethod>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .fetch_one(&mut *tx)
            .await?;

        let mut stages = Vec::with_capacity(input.stages.len());
        for (pos, stage) in input.stages.iter().enumerate() {
            let order_index = pos as i32 + 1;
            let row = StageRepo::insert(
                &mut *tx,
                method.id,
                order_index,
                stage.name.trim(),
                stage.is_required.unwrap_or(true),
            )
            .await?;
            stages.push(row);
        }

        tx.commit().await?;
        Ok((method, stages))
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProcessingMethod>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processing_methods WHERE id = $1");
        sqlx::query_as::<_, ProcessingMethod>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all methods ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<ProcessingMethod>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processing_methods ORDER BY name ASC");
        sqlx::query_as::<_, ProcessingMethod>(&query)
            .fetch_all(pool)
            .await
    }
}
