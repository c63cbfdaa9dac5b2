//! Whole-space copies.
//!
//! [`CopyEngine::copy_space`] runs the synchronous part of a copy (precheck,
//! source lock, destination shell) and hands the population phases to a
//! background task. The returned [`CopyHandle`] carries the destination
//! space, a progress channel, a cancellation token and the task's join
//! handle. Callers that only poll the destination status see the same
//! transitions: `Copying`, then `Open` or `Failed`.

mod phases;
pub mod snapshot;

use std::sync::Arc;

use serde::Serialize;
use scenegraph_core::limits::precheck_copy;
use scenegraph_core::naming::generate_name;
use scenegraph_core::remap::{EntityKind, RemapContext};
use scenegraph_core::space::{ensure_copyable, ensure_lockable, SpaceStatus};
use scenegraph_core::types::DbId;
use scenegraph_db::models::space::{CreateSpace, Space};
use scenegraph_db::GraphStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::phases::PhaseRunner;
use self::snapshot::SpaceSnapshot;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::SceneGraph;

// ---------------------------------------------------------------------------
// Progress and results
// ---------------------------------------------------------------------------

/// Stage of a running copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPhase {
    Pending,
    SceneSets,
    Scenes,
    Steps,
    Inputs,
    Outputs,
    Done,
    Failed,
}

impl CopyPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::SceneSets => "scene_sets",
            Self::Scenes => "scenes",
            Self::Steps => "steps",
            Self::Inputs => "inputs",
            Self::Outputs => "outputs",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for CopyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest progress of a copy, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyProgress {
    pub phase: CopyPhase,
    /// Entities of the current phase already processed.
    pub done: usize,
    /// Entities in the current phase.
    pub total: usize,
}

/// A reference a copied value still carries because it could not be remapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRef {
    pub entity: EntityKind,
    /// ID of the destination row holding the value.
    pub id: DbId,
    pub token: String,
}

/// Rows created per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyCounts {
    pub scene_sets: usize,
    pub scenes: usize,
    pub steps: usize,
    pub inputs: usize,
    pub outputs: usize,
}

impl CopyCounts {
    fn from_context(ctx: &RemapContext) -> Self {
        Self {
            scene_sets: ctx.len(EntityKind::SceneSet),
            scenes: ctx.len(EntityKind::Scene),
            steps: ctx.len(EntityKind::Step),
            inputs: ctx.len(EntityKind::Input),
            outputs: ctx.len(EntityKind::Output),
        }
    }
}

/// Final outcome of a copy task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyReport {
    pub destination_space_id: DbId,
    /// The locked source, when the copy was a duplicate.
    pub source_space_id: Option<DbId>,
    /// Final destination status: `Open` or `Failed`.
    pub status: SpaceStatus,
    pub counts: CopyCounts,
    pub unresolved: Vec<UnresolvedRef>,
    /// Why the copy failed.
    pub error: Option<String>,
}

impl CopyReport {
    pub fn succeeded(&self) -> bool {
        self.status == SpaceStatus::Open
    }
}

/// Handle to a copy running in the background.
#[derive(Debug)]
pub struct CopyHandle {
    /// The destination space as created (status `Copying`).
    pub space: Space,
    pub progress: watch::Receiver<CopyProgress>,
    cancel: CancellationToken,
    task: JoinHandle<CopyReport>,
}

impl CopyHandle {
    /// Ask the copy to stop. The destination ends `Failed`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the copy task to finish.
    pub async fn wait(self) -> Result<CopyReport, EngineError> {
        self.task.await.map_err(|e| {
            scenegraph_core::error::CoreError::Internal(format!("copy task failed: {e}")).into()
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Starts copies and imports of whole spaces.
#[derive(Clone)]
pub struct CopyEngine {
    graph: SceneGraph,
    config: EngineConfig,
}

impl CopyEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
        Self {
            graph: SceneGraph::new(store),
            config,
        }
    }

    fn store(&self) -> &Arc<dyn GraphStore> {
        self.graph.store()
    }

    /// Copy a space.
    ///
    /// A `Copying` or `Failed` source is rejected. With `as_duplicate` the
    /// source must be `Open`; it is `Locked` until the copy finishes and the
    /// destination gets a collision-free name.
    /// Limit and state errors are returned before anything is written.
    pub async fn copy_space(
        &self,
        space_id: DbId,
        as_duplicate: bool,
    ) -> Result<CopyHandle, EngineError> {
        let source = self.graph.space(space_id).await?;
        ensure_copyable(&source.name, source.status)?;
        if as_duplicate {
            ensure_lockable(&source.name, source.status)?;
        }

        let snapshot = SpaceSnapshot::load(&self.graph, space_id).await?;
        precheck_copy(&snapshot.counts())?;

        let name = if as_duplicate {
            let siblings: Vec<String> = self
                .store()
                .list_spaces_by_project(source.project_id)
                .await?
                .into_iter()
                .map(|s| s.name)
                .collect();
            generate_name(&source.name, &siblings)
        } else {
            source.name.clone()
        };

        let locked = if as_duplicate {
            self.store()
                .update_space_status(source.id, SpaceStatus::Locked)
                .await?;
            tracing::info!(space_id = source.id, "Source space locked for copy");
            Some(source.id)
        } else {
            None
        };

        let input = CreateSpace {
            project_id: source.project_id,
            name,
            description: source.description.clone(),
            status: SpaceStatus::Copying,
            source_space_id: locked,
        };
        self.start(input, snapshot, locked).await
    }

    /// Re-create an exported snapshot as a new space of `project_id`.
    ///
    /// Nothing is locked and the original name is kept.
    pub async fn import_snapshot(
        &self,
        snapshot: SpaceSnapshot,
        project_id: DbId,
    ) -> Result<CopyHandle, EngineError> {
        precheck_copy(&snapshot.counts())?;
        let input = CreateSpace {
            project_id,
            name: snapshot.space.name.clone(),
            description: snapshot.space.description.clone(),
            status: SpaceStatus::Copying,
            source_space_id: None,
        };
        self.start(input, snapshot, None).await
    }

    /// Create the destination shell and spawn the population task.
    async fn start(
        &self,
        input: CreateSpace,
        snapshot: SpaceSnapshot,
        locked: Option<DbId>,
    ) -> Result<CopyHandle, EngineError> {
        let store = Arc::clone(self.store());
        let space = match store.create_space(&input).await {
            Ok(space) => space,
            Err(e) => {
                if let Some(source) = locked {
                    unlock(store.as_ref(), source).await;
                }
                return Err(e.into());
            }
        };
        tracing::info!(
            space_id = space.id,
            source_space_id = ?locked,
            "Copy destination created",
        );

        let (progress_tx, progress_rx) = watch::channel(CopyProgress {
            phase: CopyPhase::Pending,
            done: 0,
            total: 0,
        });
        let cancel = CancellationToken::new();
        let runner = PhaseRunner {
            store: Arc::clone(&store),
            snapshot,
            destination: space.id,
            progress: Arc::new(progress_tx),
            cancel: cancel.clone(),
            check_every: self.config.cancel_check_every.max(1),
            ctx: RemapContext::new(),
            unresolved: Vec::new(),
        };
        let task = tokio::spawn(run_copy(store, runner, space.id, locked));

        Ok(CopyHandle {
            space,
            progress: progress_rx,
            cancel,
            task,
        })
    }
}

/// Background body of a copy.
///
/// The phases run in a nested task so that a panic inside them still ends
/// with the destination `Failed` and the source unlocked.
async fn run_copy(
    store: Arc<dyn GraphStore>,
    runner: PhaseRunner,
    destination: DbId,
    locked: Option<DbId>,
) -> CopyReport {
    let progress = Arc::clone(&runner.progress);
    let inner = tokio::spawn(async move {
        let mut runner = runner;
        let result = runner.run().await;
        (result, runner.ctx, runner.unresolved)
    });

    let (outcome, counts, unresolved) = match inner.await {
        Ok((result, ctx, unresolved)) => (
            result.map_err(|e| e.to_string()),
            CopyCounts::from_context(&ctx),
            unresolved,
        ),
        Err(e) => (
            Err(format!("copy task aborted: {e}")),
            CopyCounts::default(),
            Vec::new(),
        ),
    };

    let status = match &outcome {
        Ok(()) => SpaceStatus::Open,
        Err(_) => SpaceStatus::Failed,
    };
    if let Err(e) = store.update_space_status(destination, status).await {
        tracing::error!(space_id = destination, error = %e, "Failed to record copy status");
    }
    if let Some(source) = locked {
        unlock(store.as_ref(), source).await;
    }

    match &outcome {
        Ok(()) => tracing::info!(
            space_id = destination,
            scenes = counts.scenes,
            steps = counts.steps,
            unresolved = unresolved.len(),
            "Copy finished",
        ),
        Err(e) => tracing::error!(space_id = destination, error = %e, "Copy failed"),
    }
    progress.send_modify(|p| {
        p.phase = if outcome.is_ok() {
            CopyPhase::Done
        } else {
            CopyPhase::Failed
        };
    });

    CopyReport {
        destination_space_id: destination,
        source_space_id: locked,
        status,
        counts,
        unresolved,
        error: outcome.err(),
    }
}

async fn unlock(store: &dyn GraphStore, space_id: DbId) {
    match store.update_space_status(space_id, SpaceStatus::Open).await {
        Ok(()) => tracing::info!(space_id, "Source space unlocked"),
        Err(e) => tracing::error!(space_id, error = %e, "Failed to unlock source space"),
    }
}
