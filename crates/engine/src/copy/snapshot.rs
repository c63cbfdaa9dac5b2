//! Ordered, serializable capture of one space's graph.
//!
//! A snapshot is both the input of a copy and the export format: scene
//! sets and scenes are stored in chain order and steps as serial groups,
//! so re-creating them in sequence reproduces the relative order.

use serde::{Deserialize, Serialize};
use scenegraph_core::chain::StepGroup;
use scenegraph_core::limits::GraphCounts;
use scenegraph_core::types::DbId;
use scenegraph_db::models::scene::Scene;
use scenegraph_db::models::scene_io::{SceneInput, SceneOutput};
use scenegraph_db::models::scene_set::SceneSet;
use scenegraph_db::models::space::Space;
use scenegraph_db::models::step::Step;

use crate::error::EngineError;
use crate::graph::SceneGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceSnapshot {
    pub space: Space,
    pub scene_sets: Vec<SceneSetSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSetSnapshot {
    pub scene_set: SceneSet,
    pub scenes: Vec<SceneSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub scene: Scene,
    pub steps: Vec<StepGroup<Step>>,
    pub inputs: Vec<SceneInput>,
    pub outputs: Vec<SceneOutput>,
}

impl SceneSnapshot {
    pub fn step_count(&self) -> usize {
        self.steps.iter().map(|g| 1 + g.children.len()).sum()
    }
}

impl SpaceSnapshot {
    /// Capture a space. Fails if any sibling chain is broken.
    pub async fn load(graph: &SceneGraph, space_id: DbId) -> Result<Self, EngineError> {
        let space = graph.space(space_id).await?;
        let store = graph.store();

        let mut scene_sets = Vec::new();
        for scene_set in graph.ordered_scene_sets(space_id).await? {
            let mut scenes = Vec::new();
            for scene in graph.ordered_scenes(scene_set.id).await? {
                scenes.push(SceneSnapshot {
                    steps: graph.step_groups(scene.id).await?,
                    inputs: store.list_inputs_by_scene(scene.id).await?,
                    outputs: store.list_outputs_by_scene(scene.id).await?,
                    scene,
                });
            }
            scene_sets.push(SceneSetSnapshot { scene_set, scenes });
        }

        Ok(Self { space, scene_sets })
    }

    pub fn scenes(&self) -> impl Iterator<Item = &SceneSnapshot> {
        self.scene_sets.iter().flat_map(|s| s.scenes.iter())
    }

    /// Counts fed to the copy precheck.
    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            scenes_per_set: self.scene_sets.iter().map(|s| s.scenes.len()).collect(),
            steps_per_scene: self.scenes().map(SceneSnapshot::step_count).collect(),
        }
    }
}
