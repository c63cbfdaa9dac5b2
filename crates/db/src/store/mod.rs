//! Storage abstraction for the scene graph.
//!
//! The engine talks to [`GraphStore`] only, so every operation runs the same
//! against Postgres ([`postgres::PgGraphStore`]) and the in-memory tables used
//! by tests ([`memory::InMemoryGraphStore`]).
//!
//! Lists come back in insertion order; sibling order is the `pre_id` chain
//! and is reconstructed by the caller.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::types::DbId;

use crate::models::legacy_case::LegacyCase;
use crate::models::scene::{CreateScene, Scene};
use crate::models::scene_io::{CreateSceneIo, SceneInput, SceneOutput};
use crate::models::scene_set::{CreateSceneSet, SceneSet};
use crate::models::space::{CreateSpace, Space};
use crate::models::step::{CreateStep, Step};

/// Errors raised by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Store error: {0}")]
    Internal(String),
}

/// Persistence operations the engine needs.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // --- Spaces ---

    async fn create_space(&self, input: &CreateSpace) -> Result<Space, StoreError>;

    /// Returns `None` if the space does not exist.
    async fn get_space(&self, id: DbId) -> Result<Option<Space>, StoreError>;

    async fn list_spaces_by_project(&self, project_id: DbId) -> Result<Vec<Space>, StoreError>;

    async fn update_space_status(&self, id: DbId, status: SpaceStatus) -> Result<(), StoreError>;

    // --- Scene sets ---

    async fn create_scene_set(&self, input: &CreateSceneSet) -> Result<SceneSet, StoreError>;

    async fn get_scene_set(&self, id: DbId) -> Result<Option<SceneSet>, StoreError>;

    async fn list_scene_sets_by_space(&self, space_id: DbId) -> Result<Vec<SceneSet>, StoreError>;

    async fn update_scene_set_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError>;

    // --- Scenes ---

    async fn create_scene(&self, input: &CreateScene) -> Result<Scene, StoreError>;

    async fn get_scene(&self, id: DbId) -> Result<Option<Scene>, StoreError>;

    async fn list_scenes_by_set(&self, set_id: DbId) -> Result<Vec<Scene>, StoreError>;

    async fn count_scenes_by_space(&self, space_id: DbId) -> Result<usize, StoreError>;

    async fn update_scene_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError>;

    // --- Steps ---

    async fn create_step(&self, input: &CreateStep) -> Result<Step, StoreError>;

    async fn list_steps_by_scene(&self, scene_id: DbId) -> Result<Vec<Step>, StoreError>;

    async fn count_steps_by_space(&self, space_id: DbId) -> Result<usize, StoreError>;

    async fn update_step_value(&self, id: DbId, value: &str) -> Result<(), StoreError>;

    // --- Inputs / outputs ---

    async fn create_input(&self, input: &CreateSceneIo) -> Result<SceneInput, StoreError>;

    async fn list_inputs_by_scene(&self, scene_id: DbId) -> Result<Vec<SceneInput>, StoreError>;

    async fn update_input_value(&self, id: DbId, value: &str) -> Result<(), StoreError>;

    async fn create_output(&self, input: &CreateSceneIo) -> Result<SceneOutput, StoreError>;

    async fn list_outputs_by_scene(&self, scene_id: DbId)
        -> Result<Vec<SceneOutput>, StoreError>;

    async fn update_output_value(&self, id: DbId, value: &str) -> Result<(), StoreError>;
}

/// Read access to a project's legacy case tree.
#[async_trait]
pub trait LegacyCaseSource: Send + Sync {
    /// Every node of the tree, directories included, in insertion order.
    async fn list_legacy_cases(&self, project_id: DbId) -> Result<Vec<LegacyCase>, StoreError>;
}
