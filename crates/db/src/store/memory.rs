//! In-memory store implementation for tests and local development.
//!
//! Every table keeps its own ID sequence, like a `BIGSERIAL` column, so IDs
//! of different tables (and of a copy and its source) overlap numerically.
//! Nothing is persisted and nothing is shared across processes.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::types::DbId;

use super::{GraphStore, LegacyCaseSource, StoreError};
use crate::models::legacy_case::{CreateLegacyCase, LegacyCase};
use crate::models::scene::{CreateScene, Scene};
use crate::models::scene_io::{CreateSceneIo, SceneInput, SceneOutput};
use crate::models::scene_set::{CreateSceneSet, SceneSet};
use crate::models::space::{CreateSpace, Space};
use crate::models::step::{CreateStep, Step};

#[derive(Debug)]
struct Table<T> {
    last_id: DbId,
    rows: BTreeMap<DbId, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn insert(&mut self, id: DbId, row: T) -> T {
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: DbId) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|r| keep(r)).cloned().collect()
    }

    fn update(
        &mut self,
        id: DbId,
        entity: &'static str,
        apply: impl FnOnce(&mut T),
    ) -> Result<(), StoreError> {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity, id })?;
        apply(row);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Tables {
    spaces: Table<Space>,
    scene_sets: Table<SceneSet>,
    scenes: Table<Scene>,
    steps: Table<Step>,
    inputs: Table<SceneInput>,
    outputs: Table<SceneOutput>,
    legacy_cases: Table<LegacyCase>,
    /// Entities whose inserts are made to fail.
    failing: HashSet<&'static str>,
}

impl Tables {
    fn check_insert(&self, entity: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(entity) {
            return Err(StoreError::Internal(format!("injected {entity} insert failure")));
        }
        Ok(())
    }
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Internal("lock poisoned".to_string())
}

/// Thread-safe in-memory [`GraphStore`] and [`LegacyCaseSource`].
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    tables: RwLock<Tables>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(poison_err)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(poison_err)
    }

    /// Insert a node of the legacy case tree.
    pub fn add_legacy_case(&self, input: CreateLegacyCase) -> Result<LegacyCase, StoreError> {
        let mut tables = self.write()?;
        let id = tables.legacy_cases.next_id();
        let row = LegacyCase {
            id,
            project_id: input.project_id,
            parent_id: input.parent_id,
            name: input.name,
            is_dir: input.is_dir,
            identifier: input.identifier,
            description: input.description,
            pipeline_yml: input.pipeline_yml,
            run_params: input.run_params,
            created_at: Utc::now(),
        };
        Ok(tables.legacy_cases.insert(id, row))
    }

    /// Make every later insert of `entity` ("scene_set", "scene", "step",
    /// "input", "output") fail.
    pub fn fail_inserts_of(&self, entity: &'static str) -> Result<(), StoreError> {
        self.write()?.failing.insert(entity);
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn create_space(&self, input: &CreateSpace) -> Result<Space, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("space")?;
        let id = tables.spaces.next_id();
        let now = Utc::now();
        let row = Space {
            id,
            project_id: input.project_id,
            name: input.name.clone(),
            description: input.description.clone(),
            status: input.status,
            source_space_id: input.source_space_id,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.spaces.insert(id, row))
    }

    async fn get_space(&self, id: DbId) -> Result<Option<Space>, StoreError> {
        Ok(self.read()?.spaces.get(id))
    }

    async fn list_spaces_by_project(&self, project_id: DbId) -> Result<Vec<Space>, StoreError> {
        Ok(self.read()?.spaces.filtered(|s| s.project_id == project_id))
    }

    async fn update_space_status(&self, id: DbId, status: SpaceStatus) -> Result<(), StoreError> {
        self.write()?.spaces.update(id, "space", |s| {
            s.status = status;
            s.updated_at = Utc::now();
        })
    }

    async fn create_scene_set(&self, input: &CreateSceneSet) -> Result<SceneSet, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("scene_set")?;
        let id = tables.scene_sets.next_id();
        let now = Utc::now();
        let row = SceneSet {
            id,
            space_id: input.space_id,
            name: input.name.clone(),
            description: input.description.clone(),
            pre_id: input.pre_id,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.scene_sets.insert(id, row))
    }

    async fn get_scene_set(&self, id: DbId) -> Result<Option<SceneSet>, StoreError> {
        Ok(self.read()?.scene_sets.get(id))
    }

    async fn list_scene_sets_by_space(&self, space_id: DbId) -> Result<Vec<SceneSet>, StoreError> {
        Ok(self.read()?.scene_sets.filtered(|s| s.space_id == space_id))
    }

    async fn update_scene_set_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError> {
        self.write()?.scene_sets.update(id, "scene_set", |s| {
            s.pre_id = pre_id;
            s.updated_at = Utc::now();
        })
    }

    async fn create_scene(&self, input: &CreateScene) -> Result<Scene, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("scene")?;
        let id = tables.scenes.next_id();
        let now = Utc::now();
        let row = Scene {
            id,
            space_id: input.space_id,
            set_id: input.set_id,
            name: input.name.clone(),
            description: input.description.clone(),
            pre_id: input.pre_id,
            ref_set_id: input.ref_set_id,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.scenes.insert(id, row))
    }

    async fn get_scene(&self, id: DbId) -> Result<Option<Scene>, StoreError> {
        Ok(self.read()?.scenes.get(id))
    }

    async fn list_scenes_by_set(&self, set_id: DbId) -> Result<Vec<Scene>, StoreError> {
        Ok(self.read()?.scenes.filtered(|s| s.set_id == set_id))
    }

    async fn count_scenes_by_space(&self, space_id: DbId) -> Result<usize, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .scenes
            .rows
            .values()
            .filter(|s| s.space_id == space_id)
            .count())
    }

    async fn update_scene_pre_id(&self, id: DbId, pre_id: DbId) -> Result<(), StoreError> {
        self.write()?.scenes.update(id, "scene", |s| {
            s.pre_id = pre_id;
            s.updated_at = Utc::now();
        })
    }

    async fn create_step(&self, input: &CreateStep) -> Result<Step, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("step")?;
        let id = tables.steps.next_id();
        let now = Utc::now();
        let row = Step {
            id,
            space_id: input.space_id,
            scene_id: input.scene_id,
            name: input.name.clone(),
            kind: input.kind,
            value: input.value.clone(),
            pre_id: input.pre_id,
            pre_type: input.pre_type,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.steps.insert(id, row))
    }

    async fn list_steps_by_scene(&self, scene_id: DbId) -> Result<Vec<Step>, StoreError> {
        Ok(self.read()?.steps.filtered(|s| s.scene_id == scene_id))
    }

    async fn count_steps_by_space(&self, space_id: DbId) -> Result<usize, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .steps
            .rows
            .values()
            .filter(|s| s.space_id == space_id)
            .count())
    }

    async fn update_step_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        self.write()?.steps.update(id, "step", |s| {
            s.value = value.to_string();
            s.updated_at = Utc::now();
        })
    }

    async fn create_input(&self, input: &CreateSceneIo) -> Result<SceneInput, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("input")?;
        let id = tables.inputs.next_id();
        let now = Utc::now();
        let row = SceneInput {
            id,
            space_id: input.space_id,
            scene_id: input.scene_id,
            name: input.name.clone(),
            value: input.value.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        Ok(tables.inputs.insert(id, row))
    }

    async fn list_inputs_by_scene(&self, scene_id: DbId) -> Result<Vec<SceneInput>, StoreError> {
        Ok(self.read()?.inputs.filtered(|i| i.scene_id == scene_id))
    }

    async fn update_input_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        self.write()?.inputs.update(id, "input", |i| {
            i.value = value.to_string();
            i.updated_at = Utc::now();
        })
    }

    async fn create_output(&self, input: &CreateSceneIo) -> Result<SceneOutput, StoreError> {
        let mut tables = self.write()?;
        tables.check_insert("output")?;
        let id = tables.outputs.next_id();
        let now = Utc::now();
        let row = SceneOutput {
            id,
            space_id: input.space_id,
            scene_id: input.scene_id,
            name: input.name.clone(),
            value: input.value.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        Ok(tables.outputs.insert(id, row))
    }

    async fn list_outputs_by_scene(&self, scene_id: DbId) -> Result<Vec<SceneOutput>, StoreError> {
        Ok(self.read()?.outputs.filtered(|o| o.scene_id == scene_id))
    }

    async fn update_output_value(&self, id: DbId, value: &str) -> Result<(), StoreError> {
        self.write()?.outputs.update(id, "output", |o| {
            o.value = value.to_string();
            o.updated_at = Utc::now();
        })
    }
}

#[async_trait]
impl LegacyCaseSource for InMemoryGraphStore {
    async fn list_legacy_cases(&self, project_id: DbId) -> Result<Vec<LegacyCase>, StoreError> {
        Ok(self.read()?.legacy_cases.filtered(|c| c.project_id == project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenegraph_core::step::{PreType, StepKind};

    fn space_input() -> CreateSpace {
        CreateSpace {
            project_id: 1,
            name: "smoke".into(),
            description: String::new(),
            status: SpaceStatus::Open,
            source_space_id: None,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_per_table() {
        let store = InMemoryGraphStore::new();
        let space = store.create_space(&space_input()).await.unwrap();
        let set = store
            .create_scene_set(&CreateSceneSet {
                space_id: space.id,
                name: "set".into(),
                description: String::new(),
                pre_id: 0,
            })
            .await
            .unwrap();
        assert_eq!(space.id, 1);
        assert_eq!(set.id, 1);
    }

    #[tokio::test]
    async fn updates_report_missing_rows() {
        let store = InMemoryGraphStore::new();
        let err = store.update_step_value(42, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "step", id: 42 }));
    }

    #[tokio::test]
    async fn injected_failure_blocks_inserts() {
        let store = InMemoryGraphStore::new();
        store.fail_inserts_of("step").unwrap();
        let err = store
            .create_step(&CreateStep {
                space_id: 1,
                scene_id: 1,
                name: String::new(),
                kind: StepKind::Wait,
                value: String::new(),
                pre_id: 0,
                pre_type: PreType::Serial,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
        assert_eq!(store.count_steps_by_space(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn status_update_persists() {
        let store = InMemoryGraphStore::new();
        let space = store.create_space(&space_input()).await.unwrap();
        store
            .update_space_status(space.id, SpaceStatus::Locked)
            .await
            .unwrap();
        let reloaded = store.get_space(space.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SpaceStatus::Locked);
    }
}
