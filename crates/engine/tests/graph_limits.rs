//! Integration tests for the guarded graph mutations.

mod common;

use assert_matches::assert_matches;
use scenegraph_core::error::CoreError;
use scenegraph_core::limits::{MAX_REF_SET_DEPTH, MAX_SCENES_PER_SET, MAX_STEPS_PER_SCENE};
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::step::PreType;
use scenegraph_db::GraphStore;
use scenegraph_engine::{EngineError, StepPlacement};

use common::{api, scene, scene_set, setup, space, step, wait};

// ---------------------------------------------------------------------------
// Test: scope ceilings
// ---------------------------------------------------------------------------

/// The 501st scene of a set is rejected and nothing is inserted.
#[tokio::test]
async fn scene_set_ceiling_rejects_the_next_scene() {
    let (store, graph) = setup();
    let sp = space(&graph, "limits").await;
    let set = scene_set(&graph, sp.id, "full").await;
    for i in 0..MAX_SCENES_PER_SET {
        scene(&graph, set.id, &format!("s{i}")).await;
    }

    let err = graph
        .append_scene(set.id, "one-too-many", "", None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(CoreError::LimitExceeded { limit, .. }) if limit == MAX_SCENES_PER_SET
    );
    assert_eq!(store.list_scenes_by_set(set.id).await.unwrap().len(), MAX_SCENES_PER_SET);
}

/// The 101st step of a scene is rejected and nothing is inserted.
#[tokio::test]
async fn scene_ceiling_rejects_the_next_step() {
    let (store, graph) = setup();
    let sp = space(&graph, "limits").await;
    let set = scene_set(&graph, sp.id, "set").await;
    let sc = scene(&graph, set.id, "busy").await;
    for i in 0..MAX_STEPS_PER_SCENE {
        step(&graph, sc.id, &format!("w{i}"), wait(1), StepPlacement::Serial).await;
    }

    let err = graph
        .append_step(sc.id, "extra", &wait(1), StepPlacement::Serial)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::LimitExceeded { .. }));
    assert_eq!(store.list_steps_by_scene(sc.id).await.unwrap().len(), MAX_STEPS_PER_SCENE);
}

// ---------------------------------------------------------------------------
// Test: naming and state guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_scene_name_is_rejected() {
    let (_store, graph) = setup();
    let sp = space(&graph, "names").await;
    let set = scene_set(&graph, sp.id, "set").await;
    scene(&graph, set.id, "login").await;

    let err = graph.append_scene(set.id, "login", "", None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn invalid_scene_name_is_rejected() {
    let (_store, graph) = setup();
    let sp = space(&graph, "names").await;
    let set = scene_set(&graph, sp.id, "set").await;

    let err = graph.append_scene(set.id, "has space", "", None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
}

/// A locked space rejects graph mutations.
#[tokio::test]
async fn locked_space_rejects_writes() {
    let (store, graph) = setup();
    let sp = space(&graph, "locked").await;
    let set = scene_set(&graph, sp.id, "set").await;
    store.update_space_status(sp.id, SpaceStatus::Locked).await.unwrap();

    let err = graph.append_scene_set(sp.id, "other", "").await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::StateConflict(_)));
    let err = graph.append_scene(set.id, "late", "", None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::StateConflict(_)));
}

// ---------------------------------------------------------------------------
// Test: scene set references
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ref_set_cycle_is_rejected() {
    let (_store, graph) = setup();
    let sp = space(&graph, "refs").await;
    let a = scene_set(&graph, sp.id, "a").await;
    let b = scene_set(&graph, sp.id, "b").await;
    graph.append_scene(a.id, "uses-b", "", Some(b.id)).await.unwrap();

    let err = graph.append_scene(b.id, "uses-a", "", Some(a.id)).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));

    let err = graph.append_scene(a.id, "uses-self", "", Some(a.id)).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
}

/// A reference chain longer than the depth ceiling is rejected.
#[tokio::test]
async fn ref_set_depth_is_bounded() {
    let (_store, graph) = setup();
    let sp = space(&graph, "deep").await;
    let mut sets = Vec::new();
    for i in 0..=MAX_REF_SET_DEPTH + 1 {
        sets.push(scene_set(&graph, sp.id, &format!("level{i}")).await);
    }

    // level1 -> level2 -> ... -> last is exactly at the ceiling.
    for i in (1..sets.len() - 1).rev() {
        graph
            .append_scene(sets[i].id, "next", "", Some(sets[i + 1].id))
            .await
            .unwrap();
    }

    let err = graph
        .append_scene(sets[0].id, "next", "", Some(sets[1].id))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::LimitExceeded { .. }));
}

#[tokio::test]
async fn missing_ref_set_is_not_found() {
    let (_store, graph) = setup();
    let sp = space(&graph, "refs").await;
    let set = scene_set(&graph, sp.id, "set").await;

    let err = graph.append_scene(set.id, "dangling", "", Some(999)).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Test: step placement
// ---------------------------------------------------------------------------

/// Parallel steps chain off their serial step in insertion order.
#[tokio::test]
async fn parallel_steps_chain_behind_their_head() {
    let (_store, graph) = setup();
    let sp = space(&graph, "steps").await;
    let set = scene_set(&graph, sp.id, "set").await;
    let sc = scene(&graph, set.id, "flow").await;

    let head = step(&graph, sc.id, "a", api("/a"), StepPlacement::Serial).await;
    let b = step(&graph, sc.id, "b", api("/b"), StepPlacement::ParallelTo(head.id)).await;
    let c = step(&graph, sc.id, "c", api("/c"), StepPlacement::ParallelTo(head.id)).await;
    let next = step(&graph, sc.id, "d", wait(1), StepPlacement::Serial).await;

    assert_eq!(b.pre_id, head.id);
    assert_eq!(b.pre_type, PreType::Parallel);
    assert_eq!(c.pre_id, b.id);
    assert_eq!(next.pre_id, head.id);
    assert_eq!(next.pre_type, PreType::Serial);

    let groups = graph.step_groups(sc.id).await.unwrap();
    assert_eq!(groups.len(), 2);
    let children: Vec<&str> = groups[0].children.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(children, vec!["b", "c"]);
}

#[tokio::test]
async fn parallel_to_unknown_head_is_not_found() {
    let (_store, graph) = setup();
    let sp = space(&graph, "steps").await;
    let set = scene_set(&graph, sp.id, "set").await;
    let sc = scene(&graph, set.id, "flow").await;

    let err = graph
        .append_step(sc.id, "orphan", &api("/x"), StepPlacement::ParallelTo(42))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Test: scene inputs and outputs
// ---------------------------------------------------------------------------

/// Outputs go through the same name and state checks as inputs.
#[tokio::test]
async fn scene_outputs_are_validated_like_inputs() {
    let (store, graph) = setup();
    let sp = space(&graph, "io").await;
    let set = scene_set(&graph, sp.id, "set").await;
    let sc = scene(&graph, set.id, "flow").await;

    let output = graph.add_output(sc.id, "token", "${{ outputs.1.token }}", "").await.unwrap();
    assert_eq!(output.scene_id, sc.id);
    assert_eq!(output.space_id, sp.id);
    assert_eq!(store.list_outputs_by_scene(sc.id).await.unwrap().len(), 1);

    let err = graph.add_output(sc.id, " ", "v", "").await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));

    store.update_space_status(sp.id, SpaceStatus::Locked).await.unwrap();
    let err = graph.add_output(sc.id, "late", "v", "").await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::StateConflict(_)));
    let err = graph.add_input(sc.id, "late", "v", "").await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::StateConflict(_)));
    assert!(store.list_inputs_by_scene(sc.id).await.unwrap().is_empty());
}
