//! Migration of a project's legacy case tree into a new space.
//!
//! Directories become scene sets (named after their path), leaf cases
//! become scenes, and each pipeline action becomes a step. A case that runs
//! another case as a snippet, or reads its outputs, is migrated after it;
//! cases caught in a dependency cycle are forced through and logged for
//! manual review. Sets and scenes are put into name order at the end.

mod worklist;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use scenegraph_core::chain::sorted_links;
use scenegraph_core::error::CoreError;
use scenegraph_core::expression::NameResolver;
use scenegraph_core::legacy::{case_dependencies, LegacyTree};
use scenegraph_core::limits;
use scenegraph_core::naming::{
    generate_name, sanitize_scene_name, scene_set_name_from_dirs, truncate_display,
    MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH,
};
use scenegraph_core::pipeline_spec::{ActionSpec, PipelineSpec, PipelineSpecCodec};
use scenegraph_core::remap::EntityKind;
use scenegraph_core::space::SpaceStatus;
use scenegraph_core::step::{PreType, StepKind, StepPayload};
use scenegraph_core::types::{DbId, CHAIN_HEAD};
use scenegraph_db::models::legacy_case::LegacyCase;
use scenegraph_db::models::scene::CreateScene;
use scenegraph_db::models::scene_io::CreateSceneIo;
use scenegraph_db::models::scene_set::CreateSceneSet;
use scenegraph_db::models::space::{CreateSpace, Space};
use scenegraph_db::models::step::CreateStep;
use scenegraph_db::{GraphStore, LegacyCaseSource};

use self::worklist::{PendingCase, Worklist};
use crate::config::EngineConfig;
use crate::copy::UnresolvedRef;
use crate::error::EngineError;

/// Outcome of one project migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub space: Space,
    pub scene_sets: usize,
    pub scenes: usize,
    pub steps: usize,
    pub inputs: usize,
    pub outputs: usize,
    /// Identifiers in the order their scenes were created.
    pub migrated: Vec<String>,
    /// Identifiers migrated despite unmet dependencies.
    pub forced: Vec<String>,
    /// Identifiers skipped because their pipeline could not be used.
    pub dropped: Vec<String>,
    pub unresolved: Vec<UnresolvedRef>,
    pub passes: usize,
}

/// Migrates legacy case trees.
#[derive(Clone)]
pub struct Migrator {
    store: Arc<dyn GraphStore>,
    cases: Arc<dyn LegacyCaseSource>,
    codec: Arc<dyn PipelineSpecCodec>,
    config: EngineConfig,
}

impl Migrator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        cases: Arc<dyn LegacyCaseSource>,
        codec: Arc<dyn PipelineSpecCodec>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cases,
            codec,
            config,
        }
    }

    /// Migrate every legacy case of `project_id` into a new space.
    ///
    /// Unparsable cases, and cases that would break a ceiling, are dropped
    /// with a warning. Store failures abort the run and leave what was
    /// written so far in place.
    pub async fn migrate_project(&self, project_id: DbId) -> Result<MigrationReport, EngineError> {
        let nodes = self.cases.list_legacy_cases(project_id).await?;

        let siblings: Vec<String> = self
            .store
            .list_spaces_by_project(project_id)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        let space = self
            .store
            .create_space(&CreateSpace {
                project_id,
                name: generate_name(&self.config.migration_space_name, &siblings),
                description: format!("Migrated from the legacy cases of project {project_id}"),
                status: SpaceStatus::Open,
                source_space_id: None,
            })
            .await?;
        tracing::info!(
            project_id,
            space_id = space.id,
            cases = nodes.len(),
            "Legacy migration started",
        );

        let mut run = MigrationRun::new(self, space);
        let tree = LegacyTree::build(&nodes);
        let pending = run.parse_leaves(nodes);
        let pending = run.create_scene_sets(&tree, pending).await?;
        run.drain(Worklist::new(pending)).await?;
        run.fix_up().await?;
        run.reorder().await?;

        let report = run.report;
        tracing::info!(
            project_id,
            space_id = report.space.id,
            scenes = report.scenes,
            steps = report.steps,
            forced = report.forced.len(),
            dropped = report.dropped.len(),
            unresolved = report.unresolved.len(),
            passes = report.passes,
            "Legacy migration finished",
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// A scene created for a legacy case.
struct MigratedScene {
    scene_id: DbId,
    /// Task alias -> step ID, within the scene.
    aliases: HashMap<String, DbId>,
}

struct MigrationRun<'a> {
    migrator: &'a Migrator,
    space_id: DbId,
    /// Full directory path -> scene set ID.
    sets_by_path: HashMap<String, DbId>,
    set_names: Vec<String>,
    /// Leaf legacy ID -> scene set ID.
    set_of_case: HashMap<DbId, DbId>,
    /// Scene set ID -> scene names already used and the last scene created.
    scenes_in_set: HashMap<DbId, (Vec<String>, DbId)>,
    /// Legacy identifier -> scene ID.
    case_scenes: HashMap<String, DbId>,
    migrated: Vec<MigratedScene>,
    report: MigrationReport,
}

impl<'a> MigrationRun<'a> {
    fn new(migrator: &'a Migrator, space: Space) -> Self {
        Self {
            migrator,
            space_id: space.id,
            sets_by_path: HashMap::new(),
            set_names: Vec::new(),
            set_of_case: HashMap::new(),
            scenes_in_set: HashMap::new(),
            case_scenes: HashMap::new(),
            migrated: Vec::new(),
            report: MigrationReport {
                space,
                scene_sets: 0,
                scenes: 0,
                steps: 0,
                inputs: 0,
                outputs: 0,
                migrated: Vec::new(),
                forced: Vec::new(),
                dropped: Vec::new(),
                unresolved: Vec::new(),
                passes: 0,
            },
        }
    }

    fn store(&self) -> &dyn GraphStore {
        self.migrator.store.as_ref()
    }

    // ---- Parsing ----

    /// Parse every leaf once and compute its dependencies.
    ///
    /// A leaf without pipeline text migrates as an empty scene. Only
    /// identifiers of parsed leaves count as dependencies.
    fn parse_leaves(&mut self, nodes: Vec<LegacyCase>) -> Vec<PendingCase> {
        let mut parsed = Vec::new();
        for case in nodes.into_iter().filter(|n| !n.is_dir) {
            let text = case.pipeline_yml.clone().unwrap_or_default();
            let spec = if text.trim().is_empty() {
                PipelineSpec::default()
            } else {
                match self.migrator.codec.parse(&text) {
                    Ok(spec) => spec,
                    Err(e) => {
                        tracing::warn!(
                            case = %case.identifier,
                            case_id = case.id,
                            error = %e,
                            "Legacy case dropped: pipeline does not parse",
                        );
                        self.report.dropped.push(case.identifier);
                        continue;
                    }
                }
            };
            parsed.push((case, text, spec));
        }

        let known: HashSet<String> = parsed.iter().map(|(c, _, _)| c.identifier.clone()).collect();
        parsed
            .into_iter()
            .map(|(case, text, spec)| PendingCase {
                deps: case_dependencies(&case.identifier, &spec, &text, &known),
                case,
                text,
                spec,
                forced: false,
            })
            .collect()
    }

    // ---- Scene sets ----

    /// Create one scene set per distinct directory path.
    ///
    /// Cases whose set would exceed the per-space ceiling are dropped
    /// before their set is written. Returns the cases left to migrate.
    async fn create_scene_sets(
        &mut self,
        tree: &LegacyTree,
        pending: Vec<PendingCase>,
    ) -> Result<Vec<PendingCase>, EngineError> {
        let budget = self.migrator.config.scene_set_name_budget.min(MAX_NAME_LENGTH);
        let mut tail = CHAIN_HEAD;
        let mut kept = Vec::with_capacity(pending.len());
        let mut dropped = HashSet::new();
        for p in pending {
            let derived = scene_set_name_from_dirs(&tree.dir_path(p.case.id), budget);
            if let Some(&set_id) = self.sets_by_path.get(&derived.description) {
                self.set_of_case.insert(p.case.id, set_id);
                kept.push(p);
                continue;
            }

            if let Err(e) = limits::validate_scene_set_count(self.set_names.len()) {
                tracing::warn!(
                    case = %p.case.identifier,
                    path = %derived.description,
                    error = %e,
                    "Legacy case dropped",
                );
                dropped.insert(p.case.identifier.clone());
                self.report.dropped.push(p.case.identifier);
                continue;
            }
            let name = generate_name(&derived.name, &self.set_names);
            let set = self
                .store()
                .create_scene_set(&CreateSceneSet {
                    space_id: self.space_id,
                    name: name.clone(),
                    description: truncate_display(&derived.description, MAX_DESCRIPTION_LENGTH),
                    pre_id: tail,
                })
                .await?;
            tail = set.id;
            self.set_names.push(name);
            self.sets_by_path.insert(derived.description, set.id);
            self.set_of_case.insert(p.case.id, set.id);
            self.report.scene_sets += 1;
            kept.push(p);
        }

        // Dropped cases never migrate, so they cannot hold anyone back.
        if !dropped.is_empty() {
            for p in &mut kept {
                p.deps.retain(|d| !dropped.contains(d));
            }
        }
        Ok(kept)
    }

    // ---- Worklist ----

    async fn drain(&mut self, mut worklist: Worklist) -> Result<(), EngineError> {
        while !worklist.is_empty() {
            self.report.passes += 1;
            let before = worklist.len();

            for id in worklist.ids() {
                let Some(pending) = worklist.take_ready(id, &self.case_scenes) else {
                    continue;
                };
                self.migrate_case(pending).await?;
            }

            if worklist.is_empty() {
                break;
            }
            if worklist.len() == before {
                for identifier in worklist.force_remaining() {
                    tracing::warn!(
                        case = %identifier,
                        "Legacy case needs manual review: its dependencies never resolved",
                    );
                    self.report.forced.push(identifier);
                }
            }
            tokio::time::sleep(self.migrator.config.poll_interval).await;
        }
        Ok(())
    }

    /// Check the ceilings a case would hit, before anything is written.
    fn precheck(&self, set_id: DbId, spec: &PipelineSpec) -> Result<(), CoreError> {
        let in_set = self.scenes_in_set.get(&set_id).map_or(0, |(names, _)| names.len());
        limits::validate_scene_count_in_set(in_set)?;
        limits::validate_scene_count_in_space(self.report.scenes)?;

        let actions = spec.actions().count();
        if actions > limits::MAX_STEPS_PER_SCENE {
            return Err(CoreError::LimitExceeded {
                scope: "steps per scene",
                limit: limits::MAX_STEPS_PER_SCENE,
            });
        }
        if self.report.steps + actions > limits::MAX_STEPS_PER_SPACE {
            return Err(CoreError::LimitExceeded {
                scope: "steps per space",
                limit: limits::MAX_STEPS_PER_SPACE,
            });
        }
        Ok(())
    }

    async fn migrate_case(&mut self, pending: PendingCase) -> Result<(), EngineError> {
        let PendingCase {
            case, text, spec, ..
        } = pending;
        let set_id = self
            .set_of_case
            .get(&case.id)
            .copied()
            .ok_or_else(|| CoreError::Internal(format!("no scene set for legacy case {}", case.id)))?;

        if let Err(e) = self.precheck(set_id, &spec) {
            tracing::warn!(case = %case.identifier, error = %e, "Legacy case dropped");
            self.report.dropped.push(case.identifier);
            return Ok(());
        }

        // Scene shell.
        let (names, tail) = self.scenes_in_set.entry(set_id).or_insert((Vec::new(), CHAIN_HEAD));
        let name = generate_name(&sanitize_scene_name(&case.name), names.as_slice());
        let scene = self
            .migrator
            .store
            .create_scene(&CreateScene {
                space_id: self.space_id,
                set_id,
                name: name.clone(),
                description: truncate_display(&case.description, MAX_DESCRIPTION_LENGTH),
                pre_id: *tail,
                ref_set_id: None,
            })
            .await?;
        names.push(name);
        *tail = scene.id;
        self.report.scenes += 1;

        // Step shells, so that aliases have IDs before values are rewritten.
        let mut aliases = HashMap::new();
        let mut step_ids = Vec::new();
        let mut prev_head = CHAIN_HEAD;
        for stage in spec.stages.iter().filter(|s| !s.actions.is_empty()) {
            let mut prev = CHAIN_HEAD;
            for (i, action) in stage.actions.iter().enumerate() {
                let (pre_id, pre_type) = if i == 0 {
                    (prev_head, PreType::Serial)
                } else {
                    (prev, PreType::Parallel)
                };
                let step = self
                    .store()
                    .create_step(&CreateStep {
                        space_id: self.space_id,
                        scene_id: scene.id,
                        name: step_name(action),
                        kind: action.kind().step_kind(),
                        value: String::new(),
                        pre_id,
                        pre_type,
                    })
                    .await?;
                if i == 0 {
                    prev_head = step.id;
                }
                prev = step.id;
                if !action.alias.is_empty() {
                    aliases.insert(action.alias.clone(), step.id);
                }
                step_ids.push(step.id);
            }
        }
        self.report.steps += step_ids.len();

        // Rewrite the pipeline text and read it back.
        let resolver = NameResolver {
            aliases: &aliases,
            cases: &self.case_scenes,
        };
        let rewritten = resolver.rewrite(&text);
        let reparsed = if rewritten.text == text {
            None
        } else {
            match self.migrator.codec.parse(&rewritten.text) {
                Ok(s) if same_shape(&s, &spec) => Some(s),
                Ok(_) => {
                    tracing::warn!(
                        case = %case.identifier,
                        "Rewritten pipeline changed shape, using the original",
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        case = %case.identifier,
                        error = %e,
                        "Rewritten pipeline does not parse, using the original",
                    );
                    None
                }
            }
        };
        let canonical = reparsed.as_ref().unwrap_or(&spec);

        for ((_, action), step_id) in canonical.actions().zip(&step_ids) {
            let payload = action.to_payload(self.space_id, |target| {
                self.case_scenes.get(target).copied()
            });
            self.store()
                .update_step_value(*step_id, &payload.encode()?)
                .await?;
        }

        // Inputs from params, with run-time overrides.
        let overrides = run_param_overrides(case.run_params.as_ref());
        for param in &canonical.params {
            let raw = overrides
                .get(param.name.as_str())
                .copied()
                .or(param.default.as_ref())
                .map(param_text)
                .unwrap_or_default();
            let value = resolver.rewrite(&raw).text;
            self.store()
                .create_input(&CreateSceneIo {
                    space_id: self.space_id,
                    scene_id: scene.id,
                    name: param.name.clone(),
                    value,
                    description: truncate_display(&param.desc, MAX_DESCRIPTION_LENGTH),
                })
                .await?;
            self.report.inputs += 1;
        }

        for output in &canonical.outputs {
            self.store()
                .create_output(&CreateSceneIo {
                    space_id: self.space_id,
                    scene_id: scene.id,
                    name: output.name.clone(),
                    value: output.reference.clone(),
                    description: truncate_display(&output.desc, MAX_DESCRIPTION_LENGTH),
                })
                .await?;
            self.report.outputs += 1;
        }

        tracing::debug!(
            case = %case.identifier,
            scene_id = scene.id,
            steps = step_ids.len(),
            "Legacy case migrated",
        );
        self.case_scenes.insert(case.identifier.clone(), scene.id);
        self.report.migrated.push(case.identifier);
        self.migrated.push(MigratedScene {
            scene_id: scene.id,
            aliases,
        });
        Ok(())
    }

    // ---- Fix-up ----

    /// Resolve what is still unresolved now that every case has a scene.
    ///
    /// References that resolved earlier are already numeric and are left
    /// alone, so running this over every value is safe.
    async fn fix_up(&mut self) -> Result<(), EngineError> {
        let mut unresolved = Vec::new();
        for scene in &self.migrated {
            let resolver = NameResolver {
                aliases: &scene.aliases,
                cases: &self.case_scenes,
            };

            for step in self.store().list_steps_by_scene(scene.scene_id).await? {
                let rewritten = resolver.rewrite(&step.value);
                let mut value = rewritten.text;
                note(&mut unresolved, EntityKind::Step, step.id, rewritten.unresolved);
                if step.kind == StepKind::Scene && !value.is_empty() {
                    value = resolve_snippet_target(&self.case_scenes, value, |target| {
                        note(&mut unresolved, EntityKind::Step, step.id, vec![target]);
                    })?;
                }
                if value != step.value {
                    self.store().update_step_value(step.id, &value).await?;
                }
            }

            for input in self.store().list_inputs_by_scene(scene.scene_id).await? {
                let rewritten = resolver.rewrite(&input.value);
                if rewritten.text != input.value {
                    self.store().update_input_value(input.id, &rewritten.text).await?;
                }
                note(&mut unresolved, EntityKind::Input, input.id, rewritten.unresolved);
            }

            for output in self.store().list_outputs_by_scene(scene.scene_id).await? {
                let rewritten = resolver.rewrite(&output.value);
                if rewritten.text != output.value {
                    self.store().update_output_value(output.id, &rewritten.text).await?;
                }
                note(&mut unresolved, EntityKind::Output, output.id, rewritten.unresolved);
            }
        }

        for entry in &unresolved {
            tracing::warn!(
                space_id = self.space_id,
                entity = %entry.entity,
                id = entry.id,
                token = %entry.token,
                "Unresolved reference left for manual review",
            );
        }
        self.report.unresolved.extend(unresolved);
        Ok(())
    }

    // ---- Ordering ----

    /// Relink scene sets, and the scenes of each set, into name order.
    async fn reorder(&self) -> Result<(), EngineError> {
        let store = self.store();
        let sets = store.list_scene_sets_by_space(self.space_id).await?;
        for (id, pre_id) in sorted_links(&sets, |s| s.name.as_str()) {
            store.update_scene_set_pre_id(id, pre_id).await?;
        }
        for set in &sets {
            let scenes = store.list_scenes_by_set(set.id).await?;
            for (id, pre_id) in sorted_links(&scenes, |s| s.name.as_str()) {
                store.update_scene_pre_id(id, pre_id).await?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn note(into: &mut Vec<UnresolvedRef>, entity: EntityKind, id: DbId, tokens: Vec<String>) {
    into.extend(tokens.into_iter().map(|token| UnresolvedRef { entity, id, token }));
}

/// Point a scene step left on a legacy identifier at the migrated scene.
fn resolve_snippet_target<F>(
    cases: &HashMap<String, DbId>,
    value: String,
    mut on_missing: F,
) -> Result<String, EngineError>
where
    F: FnMut(String),
{
    let StepPayload::Scene(mut payload) = StepPayload::decode(StepKind::Scene, &value)? else {
        return Ok(value);
    };
    let Some(target) = payload.legacy_target.take().filter(|t| !t.is_empty()) else {
        return Ok(value);
    };
    match cases.get(&target) {
        Some(&scene_id) => {
            payload.scene_id = Some(scene_id);
            Ok(StepPayload::Scene(payload).encode()?)
        }
        None => {
            on_missing(target);
            Ok(value)
        }
    }
}

fn step_name(action: &ActionSpec) -> String {
    let name = if action.alias.is_empty() {
        &action.action_type
    } else {
        &action.alias
    };
    name.chars().take(MAX_NAME_LENGTH).collect()
}

/// Whether two specs have the same stages with the same number of actions.
fn same_shape(a: &PipelineSpec, b: &PipelineSpec) -> bool {
    a.stages.len() == b.stages.len()
        && a
            .stages
            .iter()
            .zip(&b.stages)
            .all(|(x, y)| x.actions.len() == y.actions.len())
}

/// Run-time param overrides, given either as `{"name": value}` or as
/// `[{"name": .., "value": ..}]`.
fn run_param_overrides(raw: Option<&serde_json::Value>) -> HashMap<&str, &serde_json::Value> {
    match raw {
        Some(serde_json::Value::Object(map)) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?;
                Some((name, item.get("value")?))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

fn param_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
