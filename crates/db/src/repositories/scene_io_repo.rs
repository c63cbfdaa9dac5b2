//! Repositories for the `scene_inputs` and `scene_outputs` tables.

use sqlx::PgPool;
use scenegraph_core::types::DbId;

use crate::models::scene_io::{CreateSceneIo, SceneInput, SceneOutput};

/// Column list shared by scene_inputs and scene_outputs queries.
const COLUMNS: &str = "id, space_id, scene_id, name, value, description, created_at, updated_at";

/// Provides CRUD operations for scene inputs.
pub struct InputRepo;

impl InputRepo {
    /// Insert a new input, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSceneIo) -> Result<SceneInput, sqlx::Error> {
        let query = format!(
            "INSERT INTO scene_inputs (space_id, scene_id, name, value, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SceneInput>(&query)
            .bind(input.space_id)
            .bind(input.scene_id)
            .bind(&input.name)
            .bind(&input.value)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// List the inputs of a scene in insertion order.
    pub async fn list_by_scene(
        pool: &PgPool,
        scene_id: DbId,
    ) -> Result<Vec<SceneInput>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scene_inputs WHERE scene_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, SceneInput>(&query)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the value. Returns `true` if a row was updated.
    pub async fn update_value(pool: &PgPool, id: DbId, value: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE scene_inputs SET value = $1, updated_at = now() WHERE id = $2")
                .bind(value)
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Provides CRUD operations for scene outputs.
pub struct OutputRepo;

impl OutputRepo {
    /// Insert a new output, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSceneIo) -> Result<SceneOutput, sqlx::Error> {
        let query = format!(
            "INSERT INTO scene_outputs (space_id, scene_id, name, value, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SceneOutput>(&query)
            .bind(input.space_id)
            .bind(input.scene_id)
            .bind(&input.name)
            .bind(&input.value)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// List the outputs of a scene in insertion order.
    pub async fn list_by_scene(
        pool: &PgPool,
        scene_id: DbId,
    ) -> Result<Vec<SceneOutput>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM scene_outputs WHERE scene_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, SceneOutput>(&query)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the value. Returns `true` if a row was updated.
    pub async fn update_value(pool: &PgPool, id: DbId, value: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE scene_outputs SET value = $1, updated_at = now() WHERE id = $2")
                .bind(value)
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
