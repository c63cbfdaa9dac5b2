#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use scenegraph_core::step::{ApiPayload, StepPayload, WaitPayload};
use scenegraph_db::models::scene::Scene;
use scenegraph_db::models::scene_set::SceneSet;
use scenegraph_db::models::space::Space;
use scenegraph_db::models::step::Step;
use scenegraph_db::{GraphStore, InMemoryGraphStore};
use scenegraph_engine::{EngineConfig, SceneGraph, StepPlacement};

pub const PROJECT_ID: i64 = 7;

/// Engine config with no delay between migration passes.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::ZERO,
        ..EngineConfig::default()
    }
}

/// A fresh in-memory store and a graph service over it.
pub fn setup() -> (Arc<InMemoryGraphStore>, SceneGraph) {
    let store = Arc::new(InMemoryGraphStore::new());
    let dyn_store: Arc<dyn GraphStore> = store.clone();
    (store, SceneGraph::new(dyn_store))
}

pub fn api(url: &str) -> StepPayload {
    StepPayload::Api(ApiPayload {
        api_spec: json!({ "method": "GET", "url": url }),
        loop_strategy: None,
    })
}

pub fn wait(secs: u64) -> StepPayload {
    StepPayload::Wait(WaitPayload {
        wait_time_secs: secs,
    })
}

pub async fn space(graph: &SceneGraph, name: &str) -> Space {
    graph
        .create_space(PROJECT_ID, name, "")
        .await
        .expect("space should be created")
}

pub async fn scene_set(graph: &SceneGraph, space_id: i64, name: &str) -> SceneSet {
    graph
        .append_scene_set(space_id, name, "")
        .await
        .expect("scene set should be created")
}

pub async fn scene(graph: &SceneGraph, set_id: i64, name: &str) -> Scene {
    graph
        .append_scene(set_id, name, "", None)
        .await
        .expect("scene should be created")
}

pub async fn step(
    graph: &SceneGraph,
    scene_id: i64,
    name: &str,
    payload: StepPayload,
    placement: StepPlacement,
) -> Step {
    graph
        .append_step(scene_id, name, &payload, placement)
        .await
        .expect("step should be created")
}
