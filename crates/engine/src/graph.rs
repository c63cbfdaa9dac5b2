//! Limit-checked graph mutations and ordered reads.
//!
//! Every create goes through the same guards: the owning space must be
//! writable, names and descriptions must validate, and the scope ceilings
//! are checked before the insert. New siblings are appended at the tail of
//! their chain.

use std::collections::HashSet;
use std::sync::Arc;

use scenegraph_core::chain::{group_steps, order_chain, StepGroup};
use scenegraph_core::error::CoreError;
use scenegraph_core::limits::{self, MAX_REF_SET_DEPTH};
use scenegraph_core::naming::{validate_description, validate_name, validate_scene_name};
use scenegraph_core::space::{ensure_writable, SpaceStatus};
use scenegraph_core::step::{PreType, StepPayload};
use scenegraph_core::types::{DbId, CHAIN_HEAD};
use scenegraph_db::models::scene::{CreateScene, Scene};
use scenegraph_db::models::scene_io::{CreateSceneIo, SceneInput, SceneOutput};
use scenegraph_db::models::scene_set::{CreateSceneSet, SceneSet};
use scenegraph_db::models::space::{CreateSpace, Space};
use scenegraph_db::models::step::{CreateStep, Step};
use scenegraph_db::GraphStore;

use crate::error::EngineError;

/// Where a new step goes in its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlacement {
    /// A new serial step after the last one.
    Serial,
    /// A parallel step beside the given serial step.
    ParallelTo(DbId),
}

/// Graph service over a [`GraphStore`].
#[derive(Clone)]
pub struct SceneGraph {
    store: Arc<dyn GraphStore>,
}

impl SceneGraph {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    // ---- Lookups ----

    pub async fn space(&self, id: DbId) -> Result<Space, EngineError> {
        self.store
            .get_space(id)
            .await?
            .ok_or(EngineError::not_found("space", id))
    }

    pub async fn scene_set(&self, id: DbId) -> Result<SceneSet, EngineError> {
        self.store
            .get_scene_set(id)
            .await?
            .ok_or(EngineError::not_found("scene_set", id))
    }

    pub async fn scene(&self, id: DbId) -> Result<Scene, EngineError> {
        self.store
            .get_scene(id)
            .await?
            .ok_or(EngineError::not_found("scene", id))
    }

    /// Load a space and reject it unless it accepts writes.
    pub async fn writable_space(&self, id: DbId) -> Result<Space, EngineError> {
        let space = self.space(id).await?;
        ensure_writable(&space.name, space.status)?;
        Ok(space)
    }

    // ---- Ordered reads ----

    /// Scene sets of a space in chain order.
    pub async fn ordered_scene_sets(&self, space_id: DbId) -> Result<Vec<SceneSet>, EngineError> {
        let sets = self.store.list_scene_sets_by_space(space_id).await?;
        Ok(order_chain(&sets, "scene set")?)
    }

    /// Scenes of a scene set in chain order.
    pub async fn ordered_scenes(&self, set_id: DbId) -> Result<Vec<Scene>, EngineError> {
        let scenes = self.store.list_scenes_by_set(set_id).await?;
        Ok(order_chain(&scenes, "scene")?)
    }

    /// Steps of a scene as serial groups with their parallel children.
    pub async fn step_groups(&self, scene_id: DbId) -> Result<Vec<StepGroup<Step>>, EngineError> {
        let steps = self.store.list_steps_by_scene(scene_id).await?;
        Ok(group_steps(&steps)?)
    }

    // ---- Mutations ----

    /// Create an open space.
    pub async fn create_space(
        &self,
        project_id: DbId,
        name: &str,
        description: &str,
    ) -> Result<Space, EngineError> {
        validate_name(name)?;
        validate_description(description)?;
        let space = self
            .store
            .create_space(&CreateSpace {
                project_id,
                name: name.to_string(),
                description: description.to_string(),
                status: SpaceStatus::Open,
                source_space_id: None,
            })
            .await?;
        tracing::info!(space_id = space.id, project_id, "Space created");
        Ok(space)
    }

    /// Append a scene set to a space.
    pub async fn append_scene_set(
        &self,
        space_id: DbId,
        name: &str,
        description: &str,
    ) -> Result<SceneSet, EngineError> {
        self.writable_space(space_id).await?;
        validate_name(name)?;
        validate_description(description)?;

        let existing = self.ordered_scene_sets(space_id).await?;
        limits::validate_scene_set_count(existing.len())?;

        let pre_id = existing.last().map_or(CHAIN_HEAD, |s| s.id);
        Ok(self
            .store
            .create_scene_set(&CreateSceneSet {
                space_id,
                name: name.to_string(),
                description: description.to_string(),
                pre_id,
            })
            .await?)
    }

    /// Append a scene to a scene set.
    ///
    /// Rejects a name already used in the set, and a `ref_set_id` that is
    /// missing, leads back to the owning set, or nests deeper than
    /// [`MAX_REF_SET_DEPTH`].
    pub async fn append_scene(
        &self,
        set_id: DbId,
        name: &str,
        description: &str,
        ref_set_id: Option<DbId>,
    ) -> Result<Scene, EngineError> {
        let set = self.scene_set(set_id).await?;
        self.writable_space(set.space_id).await?;
        validate_scene_name(name)?;
        validate_description(description)?;

        let siblings = self.ordered_scenes(set_id).await?;
        if siblings.iter().any(|s| s.name == name) {
            return Err(CoreError::Validation(format!(
                "a scene named '{name}' already exists in scene set {set_id}"
            ))
            .into());
        }
        limits::validate_scene_count_in_set(siblings.len())?;
        let in_space = self.store.count_scenes_by_space(set.space_id).await?;
        limits::validate_scene_count_in_space(in_space)?;

        if let Some(target) = ref_set_id {
            self.check_ref_set(set_id, target).await?;
        }

        let pre_id = siblings.last().map_or(CHAIN_HEAD, |s| s.id);
        Ok(self
            .store
            .create_scene(&CreateScene {
                space_id: set.space_id,
                set_id,
                name: name.to_string(),
                description: description.to_string(),
                pre_id,
                ref_set_id,
            })
            .await?)
    }

    /// Walk scene-set references from `target` and fail on a path back to
    /// `owner` or one longer than [`MAX_REF_SET_DEPTH`].
    pub async fn check_ref_set(&self, owner: DbId, target: DbId) -> Result<(), EngineError> {
        self.scene_set(target).await?;

        let mut expanded = HashSet::new();
        let mut frontier = vec![target];
        let mut depth = 0;
        while !frontier.is_empty() {
            depth += 1;
            if depth > MAX_REF_SET_DEPTH {
                return Err(CoreError::LimitExceeded {
                    scope: "nested scene set references",
                    limit: MAX_REF_SET_DEPTH,
                }
                .into());
            }
            let mut next = Vec::new();
            for set_id in frontier {
                if set_id == owner {
                    return Err(CoreError::Validation(format!(
                        "scene set {owner} would reference itself through scene set {target}"
                    ))
                    .into());
                }
                if !expanded.insert(set_id) {
                    continue;
                }
                for scene in self.store.list_scenes_by_set(set_id).await? {
                    next.extend(scene.ref_set_id);
                }
            }
            frontier = next;
        }
        Ok(())
    }

    /// Append a step to a scene.
    pub async fn append_step(
        &self,
        scene_id: DbId,
        name: &str,
        payload: &StepPayload,
        placement: StepPlacement,
    ) -> Result<Step, EngineError> {
        let scene = self.scene(scene_id).await?;
        self.writable_space(scene.space_id).await?;

        let groups = self.step_groups(scene_id).await?;
        let in_scene: usize = groups.iter().map(|g| 1 + g.children.len()).sum();
        limits::validate_step_count_in_scene(in_scene)?;
        let in_space = self.store.count_steps_by_space(scene.space_id).await?;
        limits::validate_step_count_in_space(in_space)?;

        let (pre_id, pre_type) = match placement {
            StepPlacement::Serial => (
                groups.last().map_or(CHAIN_HEAD, |g| g.head.id),
                PreType::Serial,
            ),
            StepPlacement::ParallelTo(head_id) => {
                let group = groups
                    .iter()
                    .find(|g| g.head.id == head_id)
                    .ok_or(EngineError::not_found("step", head_id))?;
                let tail = group.children.last().map_or(head_id, |c| c.id);
                (tail, PreType::Parallel)
            }
        };

        Ok(self
            .store
            .create_step(&CreateStep {
                space_id: scene.space_id,
                scene_id,
                name: name.to_string(),
                kind: payload.kind(),
                value: payload.encode()?,
                pre_id,
                pre_type,
            })
            .await?)
    }

    pub async fn add_input(
        &self,
        scene_id: DbId,
        name: &str,
        value: &str,
        description: &str,
    ) -> Result<SceneInput, EngineError> {
        let input = self.scene_io(scene_id, name, value, description).await?;
        Ok(self.store.create_input(&input).await?)
    }

    pub async fn add_output(
        &self,
        scene_id: DbId,
        name: &str,
        value: &str,
        description: &str,
    ) -> Result<SceneOutput, EngineError> {
        let output = self.scene_io(scene_id, name, value, description).await?;
        Ok(self.store.create_output(&output).await?)
    }

    async fn scene_io(
        &self,
        scene_id: DbId,
        name: &str,
        value: &str,
        description: &str,
    ) -> Result<CreateSceneIo, EngineError> {
        let scene = self.scene(scene_id).await?;
        self.writable_space(scene.space_id).await?;
        validate_name(name)?;
        validate_description(description)?;
        Ok(CreateSceneIo {
            space_id: scene.space_id,
            scene_id,
            name: name.to_string(),
            value: value.to_string(),
            description: description.to_string(),
        })
    }
}
