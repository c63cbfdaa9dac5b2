//! Fixed-point scheduling of legacy cases.
//!
//! A case is ready once every case it depends on has been migrated. When a
//! whole pass finds nothing ready, every case still waiting is forced: it is
//! migrated on the next pass regardless of its dependencies.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use scenegraph_core::pipeline_spec::PipelineSpec;
use scenegraph_core::types::DbId;
use scenegraph_db::models::legacy_case::LegacyCase;

/// A parsed leaf case waiting to be migrated.
#[derive(Debug, Clone)]
pub(crate) struct PendingCase {
    pub case: LegacyCase,
    pub text: String,
    pub spec: PipelineSpec,
    /// Identifiers of the cases this one waits for.
    pub deps: BTreeSet<String>,
    pub forced: bool,
}

impl PendingCase {
    fn is_ready(&self, migrated: &HashMap<String, DbId>) -> bool {
        self.forced || self.deps.iter().all(|d| migrated.contains_key(d))
    }
}

/// Cases still waiting, keyed by legacy ID so passes visit them in a stable order.
#[derive(Debug, Default)]
pub(crate) struct Worklist {
    waiting: BTreeMap<DbId, PendingCase>,
}

impl Worklist {
    pub fn new(cases: impl IntoIterator<Item = PendingCase>) -> Self {
        Self {
            waiting: cases.into_iter().map(|p| (p.case.id, p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// IDs of the waiting cases, in visiting order.
    pub fn ids(&self) -> Vec<DbId> {
        self.waiting.keys().copied().collect()
    }

    /// Remove and return `id` if it can be migrated now.
    pub fn take_ready(&mut self, id: DbId, migrated: &HashMap<String, DbId>) -> Option<PendingCase> {
        if self.waiting.get(&id)?.is_ready(migrated) {
            self.waiting.remove(&id)
        } else {
            None
        }
    }

    /// Force every waiting case and return the identifiers that were not
    /// forced before.
    pub fn force_remaining(&mut self) -> Vec<String> {
        self.waiting
            .values_mut()
            .filter(|p| !p.forced)
            .map(|p| {
                p.forced = true;
                p.case.identifier.clone()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
