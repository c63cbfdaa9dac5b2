//! The population phases of a copy.
//!
//! Phases run in a fixed order, each over the whole snapshot: scene sets,
//! scenes, steps, inputs, outputs. Every created row is linked after the
//! previously created destination sibling and recorded in the run's
//! [`RemapContext`] before any later phase needs it.

use std::sync::Arc;

use scenegraph_core::expression::{rewrite_copied_value, ReferenceScope};
use scenegraph_core::remap::{EntityKind, RemapContext};
use scenegraph_core::step::{PreType, StepKind, StepPayload};
use scenegraph_core::types::{DbId, CHAIN_HEAD};
use scenegraph_db::models::scene::CreateScene;
use scenegraph_db::models::scene_io::CreateSceneIo;
use scenegraph_db::models::scene_set::CreateSceneSet;
use scenegraph_db::models::step::{CreateStep, Step};
use scenegraph_db::GraphStore;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::snapshot::SpaceSnapshot;
use super::{CopyPhase, CopyProgress, UnresolvedRef};
use crate::error::EngineError;

pub(crate) struct PhaseRunner {
    pub store: Arc<dyn GraphStore>,
    pub snapshot: SpaceSnapshot,
    pub destination: DbId,
    pub progress: Arc<watch::Sender<CopyProgress>>,
    pub cancel: CancellationToken,
    pub check_every: usize,
    pub ctx: RemapContext,
    pub unresolved: Vec<UnresolvedRef>,
}

impl PhaseRunner {
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.copy_scene_sets().await?;
        self.copy_scenes().await?;
        self.copy_steps().await?;
        self.copy_inputs().await?;
        self.copy_outputs().await?;
        Ok(())
    }

    fn begin(&self, phase: CopyPhase, total: usize) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        tracing::info!(
            space_id = self.destination,
            phase = %phase,
            total,
            "Copy phase started",
        );
        self.progress.send_replace(CopyProgress {
            phase,
            done: 0,
            total,
        });
        Ok(())
    }

    /// Report progress and honour cancellation every `check_every` entities.
    fn advance(&self, done: usize) -> Result<(), EngineError> {
        if done % self.check_every == 0 && self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.progress.send_modify(|p| p.done = done);
        Ok(())
    }

    fn remapped(&self, kind: EntityKind, old: DbId) -> Result<DbId, EngineError> {
        self.ctx.get(kind, old).ok_or_else(|| {
            scenegraph_core::error::CoreError::Internal(format!(
                "{kind} {old} was not copied before its dependents"
            ))
            .into()
        })
    }

    fn note_unresolved(&mut self, entity: EntityKind, id: DbId, tokens: Vec<String>) {
        for token in tokens {
            tracing::warn!(
                space_id = self.destination,
                entity = %entity,
                id,
                token = %token,
                "Unresolved reference kept as is",
            );
            self.unresolved.push(UnresolvedRef { entity, id, token });
        }
    }

    // ---- CopySceneSets ----

    async fn copy_scene_sets(&mut self) -> Result<(), EngineError> {
        let sets: Vec<_> = self
            .snapshot
            .scene_sets
            .iter()
            .map(|s| s.scene_set.clone())
            .collect();
        self.begin(CopyPhase::SceneSets, sets.len())?;

        let mut pre_id = CHAIN_HEAD;
        for (i, set) in sets.into_iter().enumerate() {
            self.advance(i)?;
            let created = self
                .store
                .create_scene_set(&CreateSceneSet {
                    space_id: self.destination,
                    name: set.name,
                    description: set.description,
                    pre_id,
                })
                .await?;
            self.ctx.put(EntityKind::SceneSet, set.id, created.id);
            pre_id = created.id;
        }
        Ok(())
    }

    // ---- CopyScenes ----

    async fn copy_scenes(&mut self) -> Result<(), EngineError> {
        let per_set: Vec<Vec<_>> = self
            .snapshot
            .scene_sets
            .iter()
            .map(|s| s.scenes.iter().map(|sc| sc.scene.clone()).collect())
            .collect();
        self.begin(CopyPhase::Scenes, per_set.iter().map(Vec::len).sum())?;

        let mut done = 0;
        for scenes in per_set {
            let mut pre_id = CHAIN_HEAD;
            for scene in scenes {
                self.advance(done)?;
                let set_id = self.remapped(EntityKind::SceneSet, scene.set_id)?;
                // References to sets outside the source space stay as they are.
                let ref_set_id = scene
                    .ref_set_id
                    .map(|r| self.ctx.get(EntityKind::SceneSet, r).unwrap_or(r));
                let created = self
                    .store
                    .create_scene(&CreateScene {
                        space_id: self.destination,
                        set_id,
                        name: scene.name,
                        description: scene.description,
                        pre_id,
                        ref_set_id,
                    })
                    .await?;
                self.ctx.put(EntityKind::Scene, scene.id, created.id);
                pre_id = created.id;
                done += 1;
            }
        }
        Ok(())
    }

    // ---- CopySceneSteps ----

    async fn copy_steps(&mut self) -> Result<(), EngineError> {
        let per_scene: Vec<_> = self
            .snapshot
            .scenes()
            .map(|s| (s.scene.id, s.steps.clone()))
            .collect();
        let total: usize = self.snapshot.scenes().map(|s| s.step_count()).sum();
        self.begin(CopyPhase::Steps, total)?;

        let mut done = 0;
        for (old_scene, groups) in per_scene {
            let scene_id = self.remapped(EntityKind::Scene, old_scene)?;
            let mut prev_head = CHAIN_HEAD;
            for group in groups {
                self.advance(done)?;
                let head = self
                    .copy_step(&group.head, scene_id, prev_head, PreType::Serial)
                    .await?;
                done += 1;

                let mut prev = head;
                for child in &group.children {
                    self.advance(done)?;
                    prev = self
                        .copy_step(child, scene_id, prev, PreType::Parallel)
                        .await?;
                    done += 1;
                }
                prev_head = head;
            }
        }
        Ok(())
    }

    async fn copy_step(
        &mut self,
        step: &Step,
        scene_id: DbId,
        pre_id: DbId,
        pre_type: PreType,
    ) -> Result<DbId, EngineError> {
        let rewritten = rewrite_copied_value(&step.value, &self.ctx, ReferenceScope::Step);
        let value = self.retarget_scene_step(step.kind, rewritten.text);
        let created = self
            .store
            .create_step(&CreateStep {
                space_id: self.destination,
                scene_id,
                name: step.name.clone(),
                kind: step.kind,
                value,
                pre_id,
                pre_type,
            })
            .await?;
        self.ctx.put(EntityKind::Step, step.id, created.id);
        self.note_unresolved(EntityKind::Step, created.id, rewritten.unresolved);
        Ok(created.id)
    }

    /// Point a nested-scene step at the copy of its target scene.
    ///
    /// Targets outside the source space are left alone, as is a value that
    /// does not decode.
    fn retarget_scene_step(&self, kind: StepKind, value: String) -> String {
        if kind != StepKind::Scene || value.is_empty() {
            return value;
        }
        let mut payload = match StepPayload::decode(kind, &value) {
            Ok(StepPayload::Scene(p)) => p,
            Ok(_) => return value,
            Err(e) => {
                tracing::warn!(space_id = self.destination, error = %e, "Scene step value kept verbatim");
                return value;
            }
        };
        let Some(new_scene) = payload
            .scene_id
            .and_then(|old| self.ctx.get(EntityKind::Scene, old))
        else {
            return value;
        };
        payload.scene_id = Some(new_scene);
        payload.space_id = self.destination;
        StepPayload::Scene(payload).encode().unwrap_or(value)
    }

    // ---- CopyInputs ----

    async fn copy_inputs(&mut self) -> Result<(), EngineError> {
        let inputs: Vec<_> = self
            .snapshot
            .scenes()
            .flat_map(|s| s.inputs.iter().cloned())
            .collect();
        self.begin(CopyPhase::Inputs, inputs.len())?;

        for (i, input) in inputs.into_iter().enumerate() {
            self.advance(i)?;
            let scene_id = self.remapped(EntityKind::Scene, input.scene_id)?;
            let rewritten = rewrite_copied_value(&input.value, &self.ctx, ReferenceScope::SceneInput);
            let created = self
                .store
                .create_input(&CreateSceneIo {
                    space_id: self.destination,
                    scene_id,
                    name: input.name,
                    value: rewritten.text,
                    description: input.description,
                })
                .await?;
            self.ctx.put(EntityKind::Input, input.id, created.id);
            self.note_unresolved(EntityKind::Input, created.id, rewritten.unresolved);
        }
        Ok(())
    }

    // ---- CopyOutputs ----

    async fn copy_outputs(&mut self) -> Result<(), EngineError> {
        let outputs: Vec<_> = self
            .snapshot
            .scenes()
            .flat_map(|s| s.outputs.iter().cloned())
            .collect();
        self.begin(CopyPhase::Outputs, outputs.len())?;

        for (i, output) in outputs.into_iter().enumerate() {
            self.advance(i)?;
            let scene_id = self.remapped(EntityKind::Scene, output.scene_id)?;
            let rewritten = rewrite_copied_value(&output.value, &self.ctx, ReferenceScope::Step);
            let created = self
                .store
                .create_output(&CreateSceneIo {
                    space_id: self.destination,
                    scene_id,
                    name: output.name,
                    value: rewritten.text,
                    description: output.description,
                })
                .await?;
            self.ctx.put(EntityKind::Output, output.id, created.id);
            self.note_unresolved(EntityKind::Output, created.id, rewritten.unresolved);
        }
        Ok(())
    }
}
