//! Repository for the `legacy_cases` table.

use sqlx::PgPool;
use scenegraph_core::types::DbId;

use crate::models::legacy_case::{CreateLegacyCase, LegacyCase};

/// Column list for legacy_cases queries.
const COLUMNS: &str = "id, project_id, parent_id, name, is_dir, identifier, description, \
    pipeline_yml, run_params, created_at";

/// Read access to the legacy case tree (plus inserts for seeding).
pub struct LegacyCaseRepo;

impl LegacyCaseRepo {
    /// Insert a legacy case, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateLegacyCase) -> Result<LegacyCase, sqlx::Error> {
        let query = format!(
            "INSERT INTO legacy_cases
                (project_id, parent_id, name, is_dir, identifier, description,
                 pipeline_yml, run_params)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LegacyCase>(&query)
            .bind(input.project_id)
            .bind(input.parent_id)
            .bind(&input.name)
            .bind(input.is_dir)
            .bind(&input.identifier)
            .bind(&input.description)
            .bind(&input.pipeline_yml)
            .bind(&input.run_params)
            .fetch_one(pool)
            .await
    }

    /// List every node of a project's case tree, directories and leaves.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<LegacyCase>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM legacy_cases WHERE project_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, LegacyCase>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}
