//! Scene models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::chain::Chained;
use scenegraph_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `scenes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Scene {
    pub id: DbId,
    pub space_id: DbId,
    /// The owning scene set.
    pub set_id: DbId,
    pub name: String,
    pub description: String,
    pub pre_id: DbId,
    /// A scene set this scene runs as a nested reference.
    pub ref_set_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Chained for Scene {
    fn id(&self) -> DbId {
        self.id
    }

    fn pre_id(&self) -> DbId {
        self.pre_id
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new scene.
#[derive(Debug, Clone)]
pub struct CreateScene {
    pub space_id: DbId,
    pub set_id: DbId,
    pub name: String,
    pub description: String,
    pub pre_id: DbId,
    pub ref_set_id: Option<DbId>,
}
