//! Integration tests for the legacy case migration.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use scenegraph_core::expression::{output_token, param_token};
use scenegraph_core::limits::MAX_SCENE_SETS_PER_SPACE;
use scenegraph_core::naming::MAX_NAME_LENGTH;
use scenegraph_core::pipeline_spec::YamlSpecCodec;
use scenegraph_core::remap::EntityKind;
use scenegraph_core::step::StepPayload;
use scenegraph_db::models::legacy_case::{CreateLegacyCase, LegacyCase};
use scenegraph_db::models::scene::Scene;
use scenegraph_db::{GraphStore, InMemoryGraphStore, LegacyCaseSource};
use scenegraph_engine::{MigrationReport, Migrator, SceneGraph};
use serde_json::json;

use common::{setup, test_config, PROJECT_ID};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn migrator(store: &Arc<InMemoryGraphStore>) -> Migrator {
    let graph_store: Arc<dyn GraphStore> = store.clone();
    let cases: Arc<dyn LegacyCaseSource> = store.clone();
    Migrator::new(graph_store, cases, Arc::new(YamlSpecCodec), test_config())
}

fn dir(store: &InMemoryGraphStore, parent: Option<i64>, name: &str) -> LegacyCase {
    store
        .add_legacy_case(CreateLegacyCase {
            project_id: PROJECT_ID,
            parent_id: parent,
            name: name.to_string(),
            is_dir: true,
            ..CreateLegacyCase::default()
        })
        .unwrap()
}

fn leaf(store: &InMemoryGraphStore, parent: Option<i64>, identifier: &str, yml: &str) -> LegacyCase {
    store
        .add_legacy_case(CreateLegacyCase {
            project_id: PROJECT_ID,
            parent_id: parent,
            name: identifier.to_string(),
            is_dir: false,
            identifier: identifier.to_string(),
            description: format!("legacy case {identifier}"),
            pipeline_yml: Some(yml.to_string()),
            run_params: None,
        })
        .unwrap()
}

fn snippet_to(target: &str) -> String {
    format!(
        "stages:\n  - actions:\n      - alias: run-{target}\n        type: snippet\n        snippet_config:\n          name: {target}\n          source: autotest\n"
    )
}

/// Scenes of the migrated space, in chain order.
async fn migrated_scenes(graph: &SceneGraph, report: &MigrationReport) -> Vec<Scene> {
    let mut scenes = Vec::new();
    for set in graph.ordered_scene_sets(report.space.id).await.unwrap() {
        scenes.extend(graph.ordered_scenes(set.id).await.unwrap());
    }
    scenes
}

fn scene_named<'a>(scenes: &'a [Scene], name: &str) -> &'a Scene {
    scenes
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no scene named {name}"))
}

const CASE_A: &str = r#"
version: "1.1"
params:
  - name: user
    default: admin
    desc: login name
stages:
  - actions:
      - alias: login
        type: api-test
        params:
          url: /login
          user: ${params.user}
outputs:
  - name: token
    ref: ${login:OUTPUT:token}
"#;

const CASE_B: &str = r#"
stages:
  - actions:
      - alias: me
        type: api-test
        params:
          url: /me
          token: ${case-a:OUTPUT:token}
"#;

// ---------------------------------------------------------------------------
// Test: dependency order and reference rewriting
// ---------------------------------------------------------------------------

/// A case reading another case's output is migrated after it and its
/// reference points at the other case's scene.
#[tokio::test]
async fn dependent_case_follows_its_dependency() {
    let (store, graph) = setup();
    let suite = dir(&store, None, "suite");
    leaf(&store, Some(suite.id), "case-b", CASE_B);
    leaf(&store, Some(suite.id), "case-a", CASE_A);

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    assert_eq!(report.migrated, vec!["case-a", "case-b"]);
    assert_eq!(report.passes, 2);
    assert!(report.forced.is_empty());
    assert!(report.unresolved.is_empty(), "{:?}", report.unresolved);
    assert_eq!((report.scene_sets, report.scenes, report.steps), (1, 2, 2));

    let scenes = migrated_scenes(&graph, &report).await;
    let a = scene_named(&scenes, "case-a");
    let b = scene_named(&scenes, "case-b");
    assert!(a.id < b.id);

    let b_steps = store.list_steps_by_scene(b.id).await.unwrap();
    let payload = b_steps[0].payload().unwrap().unwrap();
    assert_matches!(payload, StepPayload::Api(p) => {
        assert_eq!(p.api_spec["token"], json!(output_token(a.id, "token")));
        assert_eq!(p.api_spec["url"], json!("/me"));
    });
}

/// Task aliases, params and outputs of a case are rewritten into current syntax.
#[tokio::test]
async fn case_internals_are_rewritten() {
    let (store, graph) = setup();
    leaf(&store, None, "case-a", CASE_A);

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();
    let scenes = migrated_scenes(&graph, &report).await;
    let a = scene_named(&scenes, "case-a");
    assert_eq!(a.description, "legacy case case-a");

    let steps = store.list_steps_by_scene(a.id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].name, "login");
    assert_matches!(steps[0].payload().unwrap(), Some(StepPayload::Api(p)) => {
        assert_eq!(p.api_spec["user"], json!(param_token("user")));
    });

    let inputs = store.list_inputs_by_scene(a.id).await.unwrap();
    assert_eq!(inputs[0].name, "user");
    assert_eq!(inputs[0].value, "admin");
    assert_eq!(inputs[0].description, "login name");

    let outputs = store.list_outputs_by_scene(a.id).await.unwrap();
    assert_eq!(outputs[0].value, output_token(steps[0].id, "token"));
}

/// Run-time overrides replace param defaults.
#[tokio::test]
async fn run_params_override_defaults() {
    let (store, graph) = setup();
    store
        .add_legacy_case(CreateLegacyCase {
            project_id: PROJECT_ID,
            name: "case-a".into(),
            identifier: "case-a".into(),
            pipeline_yml: Some(CASE_A.into()),
            run_params: Some(json!([{ "name": "user", "value": "bob" }])),
            ..CreateLegacyCase::default()
        })
        .unwrap();

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();
    let scenes = migrated_scenes(&graph, &report).await;
    let inputs = store.list_inputs_by_scene(scenes[0].id).await.unwrap();
    assert_eq!(inputs[0].value, "bob");
}

// ---------------------------------------------------------------------------
// Test: cycles and bad input
// ---------------------------------------------------------------------------

/// Cases in a snippet cycle are forced through once each and still end up
/// pointing at each other.
#[tokio::test]
async fn snippet_cycle_is_forced_and_fixed_up() {
    let (store, graph) = setup();
    leaf(&store, None, "case-x", &snippet_to("case-y"));
    leaf(&store, None, "case-y", &snippet_to("case-x"));
    leaf(&store, None, "case-i", CASE_A);

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    assert_eq!(report.forced, vec!["case-x", "case-y"]);
    assert_eq!(report.migrated, vec!["case-i", "case-x", "case-y"]);
    assert_eq!(report.passes, 3);
    assert!(report.unresolved.is_empty(), "{:?}", report.unresolved);

    let scenes = migrated_scenes(&graph, &report).await;
    let x = scene_named(&scenes, "case-x");
    let y = scene_named(&scenes, "case-y");
    for (from, to) in [(x, y), (y, x)] {
        let steps = store.list_steps_by_scene(from.id).await.unwrap();
        assert_matches!(steps[0].payload().unwrap(), Some(StepPayload::Scene(p)) => {
            assert_eq!(p.scene_id, Some(to.id));
            assert_eq!(p.legacy_target, None);
            assert_eq!(p.space_id, report.space.id);
        });
    }
}

/// An unparsable case is dropped; a case that runs it keeps a reported
/// dangling target.
#[tokio::test]
async fn unparsable_case_is_dropped() {
    let (store, _graph) = setup();
    leaf(&store, None, "case-broken", "stages: [[[");
    leaf(&store, None, "case-user", &snippet_to("case-broken"));

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    assert_eq!(report.dropped, vec!["case-broken"]);
    assert_eq!(report.migrated, vec!["case-user"]);
    assert!(report.forced.is_empty());
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].entity, EntityKind::Step);
    assert_eq!(report.unresolved[0].token, "case-broken");
}

// ---------------------------------------------------------------------------
// Test: naming and order
// ---------------------------------------------------------------------------

/// Scene sets and their scenes end up in name order.
#[tokio::test]
async fn sets_and_scenes_are_sorted_by_name() {
    let (store, graph) = setup();
    let zeta = dir(&store, None, "zeta");
    let alpha = dir(&store, None, "alpha");
    leaf(&store, Some(zeta.id), "b-case", "");
    leaf(&store, Some(zeta.id), "a-case", "");
    leaf(&store, Some(alpha.id), "only", "");

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    let sets = graph.ordered_scene_sets(report.space.id).await.unwrap();
    let set_names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(set_names, vec!["alpha", "zeta"]);

    let scenes = graph.ordered_scenes(sets[1].id).await.unwrap();
    let scene_names: Vec<&str> = scenes.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(scene_names, vec!["a-case", "b-case"]);
}

/// Nested directories name their set deepest-first without the root, and
/// legacy names are sanitized into scene names.
#[tokio::test]
async fn directory_paths_name_scene_sets() {
    let (store, graph) = setup();
    let root = dir(&store, None, "root");
    let user = dir(&store, Some(root.id), "user");
    let login = dir(&store, Some(user.id), "login");
    store
        .add_legacy_case(CreateLegacyCase {
            project_id: PROJECT_ID,
            parent_id: Some(login.id),
            name: "with password (v2)".into(),
            identifier: "c1".into(),
            ..CreateLegacyCase::default()
        })
        .unwrap();

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    let sets = graph.ordered_scene_sets(report.space.id).await.unwrap();
    assert_eq!(sets[0].name, "login_user");
    assert_eq!(sets[0].description, "login_user");
    let scenes = graph.ordered_scenes(sets[0].id).await.unwrap();
    assert_eq!(scenes[0].name, "with_password__v2_");
}

/// Two legacy cases with the same overlong name get distinct scene names
/// that both fit the name length limit.
#[tokio::test]
async fn colliding_long_names_stay_within_the_limit() {
    let (store, graph) = setup();
    let long = "n".repeat(MAX_NAME_LENGTH + 10);
    for identifier in ["c1", "c2"] {
        store
            .add_legacy_case(CreateLegacyCase {
                project_id: PROJECT_ID,
                name: long.clone(),
                identifier: identifier.into(),
                ..CreateLegacyCase::default()
            })
            .unwrap();
    }

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    let scenes = migrated_scenes(&graph, &report).await;
    assert_eq!(scenes.len(), 2);
    assert_ne!(scenes[0].name, scenes[1].name);
    for scene in &scenes {
        assert!(scene.name.chars().count() <= MAX_NAME_LENGTH, "{}", scene.name);
    }
}

// ---------------------------------------------------------------------------
// Test: ceilings
// ---------------------------------------------------------------------------

/// A case whose directory would add one scene set too many is dropped;
/// the rest of the project still migrates.
#[tokio::test]
async fn scene_set_ceiling_drops_the_overflowing_case() {
    let (store, graph) = setup();
    for i in 0..=MAX_SCENE_SETS_PER_SPACE {
        let d = dir(&store, None, &format!("dir{i:03}"));
        leaf(&store, Some(d.id), &format!("case-{i:03}"), "");
    }

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    let last = format!("case-{MAX_SCENE_SETS_PER_SPACE:03}");
    assert_eq!(report.dropped, vec![last.clone()]);
    assert_eq!(report.scene_sets, MAX_SCENE_SETS_PER_SPACE);
    assert_eq!(report.scenes, MAX_SCENE_SETS_PER_SPACE);
    assert!(!report.migrated.contains(&last));
    let sets = graph.ordered_scene_sets(report.space.id).await.unwrap();
    assert_eq!(sets.len(), MAX_SCENE_SETS_PER_SPACE);
}

/// A case that runs a dropped case is not held back by it.
#[tokio::test]
async fn dropped_dependency_does_not_force_its_dependents() {
    let (store, _graph) = setup();
    let mut dirs = Vec::new();
    for i in 0..MAX_SCENE_SETS_PER_SPACE {
        let d = dir(&store, None, &format!("dir{i:03}"));
        leaf(&store, Some(d.id), &format!("case-{i:03}"), "");
        dirs.push(d);
    }
    let overflow = dir(&store, None, "overflow");
    leaf(&store, Some(overflow.id), "case-over", "");
    // Lands in the first directory, which already has a set.
    store
        .add_legacy_case(CreateLegacyCase {
            project_id: PROJECT_ID,
            parent_id: Some(dirs[0].id),
            name: "user".into(),
            identifier: "case-user".into(),
            pipeline_yml: Some(snippet_to("case-over")),
            ..CreateLegacyCase::default()
        })
        .unwrap();

    let report = migrator(&store).migrate_project(PROJECT_ID).await.unwrap();

    assert_eq!(report.dropped, vec!["case-over"]);
    assert!(report.forced.is_empty());
    assert!(report.migrated.contains(&"case-user".to_string()));
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].token, "case-over");
}

/// Each run writes into its own space.
#[tokio::test]
async fn repeated_migration_gets_a_fresh_space() {
    let (store, _graph) = setup();
    leaf(&store, None, "case-a", CASE_A);
    let migrator = migrator(&store);

    let first = migrator.migrate_project(PROJECT_ID).await.unwrap();
    let second = migrator.migrate_project(PROJECT_ID).await.unwrap();

    assert_eq!(first.space.name, "legacy-migration");
    assert_eq!(second.space.name, "legacy-migration_1");
    assert_eq!(second.scenes, 1);
}
