//! Repository for the `scene_steps` table.

use sqlx::PgPool;
use scenegraph_core::types::DbId;

use crate::models::step::{CreateStep, Step};

/// Column list for scene_steps queries.
const COLUMNS: &str = "id, space_id, scene_id, name, kind, value, pre_id, pre_type, \
    created_at, updated_at";

/// Provides CRUD operations for scene steps.
pub struct StepRepo;

impl StepRepo {
    /// Insert a new step, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateStep) -> Result<Step, sqlx::Error> {
        let query = format!(
            "INSERT INTO scene_steps (space_id, scene_id, name, kind, value, pre_id, pre_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Step>(&query)
            .bind(input.space_id)
            .bind(input.scene_id)
            .bind(&input.name)
            .bind(input.kind.as_str())
            .bind(&input.value)
            .bind(input.pre_id)
            .bind(input.pre_type.as_str())
            .fetch_one(pool)
            .await
    }

    /// List the steps of a scene in insertion order.
    pub async fn list_by_scene(pool: &PgPool, scene_id: DbId) -> Result<Vec<Step>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scene_steps WHERE scene_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Step>(&query)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }

    /// Count the steps of a space.
    pub async fn count_by_space(pool: &PgPool, space_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scene_steps WHERE space_id = $1")
            .bind(space_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Replace the serialized value. Returns `true` if a row was updated.
    pub async fn update_value(pool: &PgPool, id: DbId, value: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE scene_steps SET value = $1, updated_at = now() WHERE id = $2")
                .bind(value)
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
