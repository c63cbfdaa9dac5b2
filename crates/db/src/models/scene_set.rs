//! Scene set models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::chain::Chained;
use scenegraph_core::types::{DbId, Timestamp};

/// A row from the `scene_sets` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SceneSet {
    pub id: DbId,
    pub space_id: DbId,
    pub name: String,
    pub description: String,
    pub pre_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Chained for SceneSet {
    fn id(&self) -> DbId {
        self.id
    }

    fn pre_id(&self) -> DbId {
        self.pre_id
    }
}

/// Input for creating a new scene set.
#[derive(Debug, Clone)]
pub struct CreateSceneSet {
    pub space_id: DbId,
    pub name: String,
    pub description: String,
    pub pre_id: DbId,
}
