//! Repository for the `scenes` table.

use sqlx::PgPool;
use scenegraph_core::types::DbId;

use crate::models::scene::{CreateScene, Scene};

/// Column list for scenes queries.
const COLUMNS: &str = "id, space_id, set_id, name, description, pre_id, ref_set_id, \
    created_at, updated_at";

/// Provides CRUD operations for scenes.
pub struct SceneRepo;

impl SceneRepo {
    /// Insert a new scene, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateScene) -> Result<Scene, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenes (space_id, set_id, name, description, pre_id, ref_set_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(input.space_id)
            .bind(input.set_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.pre_id)
            .bind(input.ref_set_id)
            .fetch_one(pool)
            .await
    }

    /// Find a scene by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE id = $1");
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the scenes of a scene set in insertion order.
    pub async fn list_by_set(pool: &PgPool, set_id: DbId) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE set_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Scene>(&query)
            .bind(set_id)
            .fetch_all(pool)
            .await
    }

    /// Count the scenes of a space.
    pub async fn count_by_space(pool: &PgPool, space_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scenes WHERE space_id = $1")
            .bind(space_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Relink a scene. Returns `true` if a row was updated.
    pub async fn update_pre_id(pool: &PgPool, id: DbId, pre_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE scenes SET pre_id = $1, updated_at = now() WHERE id = $2")
            .bind(pre_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
