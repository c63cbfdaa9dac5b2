//! Repository for the `scene_sets` table.

use sqlx::PgPool;
use scenegraph_core::types::DbId;

use crate::models::scene_set::{CreateSceneSet, SceneSet};

/// Column list for scene_sets queries.
const COLUMNS: &str = "id, space_id, name, description, pre_id, created_at, updated_at";

/// Provides CRUD operations for scene sets.
pub struct SceneSetRepo;

impl SceneSetRepo {
    /// Insert a new scene set, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSceneSet) -> Result<SceneSet, sqlx::Error> {
        let query = format!(
            "INSERT INTO scene_sets (space_id, name, description, pre_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SceneSet>(&query)
            .bind(input.space_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.pre_id)
            .fetch_one(pool)
            .await
    }

    /// Find a scene set by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SceneSet>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scene_sets WHERE id = $1");
        sqlx::query_as::<_, SceneSet>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the scene sets of a space in insertion order (not chain order).
    pub async fn list_by_space(
        pool: &PgPool,
        space_id: DbId,
    ) -> Result<Vec<SceneSet>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scene_sets WHERE space_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, SceneSet>(&query)
            .bind(space_id)
            .fetch_all(pool)
            .await
    }

    /// Relink a scene set. Returns `true` if a row was updated.
    pub async fn update_pre_id(pool: &PgPool, id: DbId, pre_id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE scene_sets SET pre_id = $1, updated_at = now() WHERE id = $2")
                .bind(pre_id)
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
