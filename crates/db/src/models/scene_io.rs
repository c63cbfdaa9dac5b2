//! Scene input and output models.
//!
//! Inputs and outputs share one shape; they live in separate tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use scenegraph_core::types::{DbId, Timestamp};

/// A row from the `scene_inputs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SceneInput {
    pub id: DbId,
    pub space_id: DbId,
    pub scene_id: DbId,
    pub name: String,
    /// Default value; may hold a placeholder expression.
    pub value: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `scene_outputs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SceneOutput {
    pub id: DbId,
    pub space_id: DbId,
    pub scene_id: DbId,
    pub name: String,
    /// Usually a placeholder expression reading a step output.
    pub value: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a scene input or output.
#[derive(Debug, Clone)]
pub struct CreateSceneIo {
    pub space_id: DbId,
    pub scene_id: DbId,
    pub name: String,
    pub value: String,
    pub description: String,
}
