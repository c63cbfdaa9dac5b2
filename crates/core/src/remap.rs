//! Old-ID -> new-ID tables for a single copy or migration run.
//!
//! A [`RemapContext`] is owned by exactly one run and filled bottom-up:
//! scene sets before the scenes that live in (or reference) them, scenes
//! before their steps, inputs and outputs, and steps before any later
//! value that refers to them.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::DbId;

/// Entity kinds that get remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    SceneSet,
    Scene,
    Step,
    Input,
    Output,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SceneSet => "scene_set",
            Self::Scene => "scene",
            Self::Step => "step",
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run remap tables, one per [`EntityKind`].
#[derive(Debug, Clone, Default)]
pub struct RemapContext {
    tables: HashMap<EntityKind, HashMap<DbId, DbId>>,
}

impl RemapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old_id` of `kind` was recreated as `new_id`.
    ///
    /// Returns the previous mapping when `old_id` was already recorded.
    pub fn put(&mut self, kind: EntityKind, old_id: DbId, new_id: DbId) -> Option<DbId> {
        self.tables.entry(kind).or_default().insert(old_id, new_id)
    }

    /// Look up the new ID recorded for `old_id`.
    pub fn get(&self, kind: EntityKind, old_id: DbId) -> Option<DbId> {
        self.tables.get(&kind)?.get(&old_id).copied()
    }

    /// Number of mappings recorded for `kind`.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, HashMap::len)
    }

    /// Whether no mapping of any kind has been recorded.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }

    /// Whether `new_id` appears as a destination of `kind`.
    pub fn is_destination(&self, kind: EntityKind, new_id: DbId) -> bool {
        self.tables
            .get(&kind)
            .is_some_and(|t| t.values().any(|&v| v == new_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_separate_per_kind() {
        let mut ctx = RemapContext::new();
        ctx.put(EntityKind::Scene, 1, 101);
        ctx.put(EntityKind::Step, 1, 201);

        assert_eq!(ctx.get(EntityKind::Scene, 1), Some(101));
        assert_eq!(ctx.get(EntityKind::Step, 1), Some(201));
        assert_eq!(ctx.get(EntityKind::SceneSet, 1), None);
        assert_eq!(ctx.len(EntityKind::Scene), 1);
    }

    #[test]
    fn put_reports_overwrite() {
        let mut ctx = RemapContext::new();
        assert_eq!(ctx.put(EntityKind::Step, 7, 70), None);
        assert_eq!(ctx.put(EntityKind::Step, 7, 71), Some(70));
        assert_eq!(ctx.get(EntityKind::Step, 7), Some(71));
    }

    #[test]
    fn empty_context() {
        let ctx = RemapContext::new();
        assert!(ctx.is_empty());
        assert_eq!(ctx.len(EntityKind::Output), 0);
        assert!(!ctx.is_destination(EntityKind::Scene, 1));
    }
}
