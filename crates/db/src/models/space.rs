//! Test space models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `test_spaces` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Space {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: SpaceStatus,
    /// Set only when the space was produced by a copy.
    pub source_space_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new space.
#[derive(Debug, Clone)]
pub struct CreateSpace {
    pub project_id: DbId,
    pub name: String,
    pub description: String,
    pub status: SpaceStatus,
    pub source_space_id: Option<DbId>,
}
