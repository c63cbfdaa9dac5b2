//! Repository for the `test_spaces` table.

use sqlx::PgPool;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::types::DbId;

use crate::models::space::{CreateSpace, Space};

/// Column list for test_spaces queries.
const COLUMNS: &str = "id, project_id, name, description, status, source_space_id, \
    created_at, updated_at";

/// Provides CRUD operations for test spaces.
pub struct SpaceRepo;

impl SpaceRepo {
    /// Insert a new space, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSpace) -> Result<Space, sqlx::Error> {
        let query = format!(
            "INSERT INTO test_spaces (project_id, name, description, status, source_space_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Space>(&query)
            .bind(input.project_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.status.as_str())
            .bind(input.source_space_id)
            .fetch_one(pool)
            .await
    }

    /// Find a space by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Space>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM test_spaces WHERE id = $1");
        sqlx::query_as::<_, Space>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the spaces of a project, oldest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Space>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_spaces WHERE project_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Space>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Set the lifecycle status. Returns `true` if a row was updated.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: SpaceStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE test_spaces SET status = $1, updated_at = now() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
