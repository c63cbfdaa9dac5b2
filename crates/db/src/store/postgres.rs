//! [`GraphStore`] over the sqlx repositories.

use async_trait::async_trait;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::types::DbId;

use super::{GraphStore, LegacyCaseSource, StoreError};
use crate::models::legacy_case::LegacyCase;
use crate::models::scene::{CreateScene, Scene};
use crate::models::scene_io::{CreateSceneIo, SceneInput, SceneOutput};
use crate::models::scene_set::{CreateSceneSet, SceneSet};
use crate::models::space::{CreateSpace, Space};
use crate::models::step::{CreateStep, Step};
use crate::repositories::{
    InputRepo, LegacyCaseRepo, OutputRepo, SceneRepo, SceneSetRepo, SpaceRepo, StepRepo,
};
use crate::DbPool;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgGraphStore {
    pool: DbPool,
}

impl PgGraphStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map an update's "row touched" flag to `NotFound`.
fn touched(updated: bool, entity: &'static str, id: DbId) -> Result<(), StoreError> {
    if updated {
        Ok(())
    } else {
        Err(StoreError::NotFound { entity, id })
    }
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn create_space(&self, input: &CreateSpace) -> Result<Space, StoreError> {
        Ok(SpaceRepo::create(&self.pool, input).await?)
    }

    async fn get_space(&self, id: DbId) -> Result<Option<Space>, StoreError> {
        Ok(SpaceRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_spaces_by_project(&self, project_id: DbId) -> Result<Vec<Space>, StoreError> {
        Ok(SpaceRepo::list_by_project(&self.pool, project_id).await?)
    }

    async fn update_space_status(&self, id: DbId, status: SpaceStatus) -> Result<(), StoreError> {
        let updated = SpaceRepo::update_status(&self.pool, id, status).await?;
        touched(updated, "space", id)
    }

    async fn create_scene_set(&self, input: &CreateSceneSet) -> Result<SceneSet, StoreError> {
        Ok(SceneSetRepo::create(&self.pool, input).await?)
    }

    async fn get_scene_set(&self, id: DbId) -> Result<Option<SceneSet>, StoreError> {
        Ok(SceneSetRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_scene_sets_by_space(&self, space_id: DbId) -> Result<Vec<SceneSet>, StoreError> {
        Ok(SceneSetRepo::list_by_space(&self.pool, space_id).await?)
    }

    async fn update_scene_set_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError> {
        let updated = SceneSetRepo::update_pre_id(&self.pool, id, pre_id).await?;
        touched(updated, "scene_set", id)
    }

    async fn create_scene(&self, input: &CreateScene) -> Result<Scene, StoreError> {
        Ok(SceneRepo::create(&self.pool, input).await?)
    }

    async fn get_scene(&self, id: DbId) -> Result<Option<Scene>, StoreError> {
        Ok(SceneRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_scenes_by_set(&self, set_id: DbId) -> Result<Vec<Scene>, StoreError> {
        Ok(SceneRepo::list_by_set(&self.pool, set_id).await?)
    }

    async fn count_scenes_by_space(&self, space_id: DbId) -> Result<usize, StoreError> {
        Ok(to_count(SceneRepo::count_by_space(&self.pool, space_id).await?))
    }

    async fn update_scene_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError> {
        let updated = SceneRepo::update_pre_id(&self.pool, id, pre_id).await?;
        touched(updated, "scene", id)
    }

    async fn create_step(&self, input: &CreateStep) -> Result<Step, StoreError> {
        Ok(StepRepo::create(&self.pool, input).await?)
    }

    async fn list_steps_by_scene(&self, scene_id: DbId) -> Result<Vec<Step>, StoreError> {
        Ok(StepRepo::list_by_scene(&self.pool, scene_id).await?)
    }

    async fn count_steps_by_space(&self, space_id: DbId) -> Result<usize, StoreError> {
        Ok(to_count(StepRepo::count_by_space(&self.pool, space_id).await?))
    }

    async fn update_step_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        let updated = StepRepo::update_value(&self.pool, id, value).await?;
        touched(updated, "step", id)
    }

    async fn create_input(&self, input: &CreateSceneIo) -> Result<SceneInput, StoreError> {
        Ok(InputRepo::create(&self.pool, input).await?)
    }

    async fn list_inputs_by_scene(&self, scene_id: DbId) -> Result<Vec<SceneInput>, StoreError> {
        Ok(InputRepo::list_by_scene(&self.pool, scene_id).await?)
    }

    async fn update_input_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        let updated = InputRepo::update_value(&self.pool, id, value).await?;
        touched(updated, "input", id)
    }

    async fn create_output(&self, input: &CreateSceneIo) -> Result<SceneOutput, StoreError> {
        Ok(OutputRepo::create(&self.pool, input).await?)
    }

    async fn list_outputs_by_scene(&self, scene_id: DbId) -> Result<Vec<SceneOutput>, StoreError> {
        Ok(OutputRepo::list_by_scene(&self.pool, scene_id).await?)
    }

    async fn update_output_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        let updated = OutputRepo::update_value(&self.pool, id, value).await?;
        touched(updated, "output", id)
    }
}

#[async_trait]
impl LegacyCaseSource for PgGraphStore {
    async fn list_legacy_cases(&self, project_id: DbId) -> Result<Vec<LegacyCase>, StoreError> {
        Ok(LegacyCaseRepo::list_by_project(&self.pool, project_id).await?)
    }
}
