//! Legacy case tree models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::legacy::LegacyNode;
use scenegraph_core::types::{DbId, Timestamp};

/// A row from the `legacy_cases` table.
///
/// Directory nodes have `is_dir = true` and no pipeline text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LegacyCase {
    pub id: DbId,
    pub project_id: DbId,
    pub parent_id: Option<DbId>,
    pub name: String,
    pub is_dir: bool,
    /// Name other cases use to reference this one.
    pub identifier: String,
    pub description: String,
    pub pipeline_yml: Option<String>,
    /// Run-time overrides of the pipeline params.
    pub run_params: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl LegacyNode for LegacyCase {
    fn node_id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }

    fn node_name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Input for inserting a legacy case.
#[derive(Debug, Clone, Default)]
pub struct CreateLegacyCase {
    pub project_id: DbId,
    pub parent_id: Option<DbId>,
    pub name: String,
    pub is_dir: bool,
    pub identifier: String,
    pub description: String,
    pub pipeline_yml: Option<String>,
    pub run_params: Option<serde_json::Value>,
}
