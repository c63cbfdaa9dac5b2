//! The legacy case tree migrated into scene graphs.
//!
//! Directory nodes become scene sets and leaf nodes become scenes. A leaf
//! depends on another leaf when its pipeline runs it as a snippet or reads
//! one of its outputs by identifier.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::expression::referenced_names;
use crate::pipeline_spec::PipelineSpec;
use crate::types::DbId;

/// A node of the legacy case tree.
pub trait LegacyNode {
    fn node_id(&self) -> DbId;
    fn parent_id(&self) -> Option<DbId>;
    fn node_name(&self) -> &str;
    fn is_dir(&self) -> bool;
}

#[derive(Debug, Clone)]
struct Entry {
    parent: Option<DbId>,
    name: String,
    is_dir: bool,
}

/// Parent links of a legacy case tree, for ancestor lookups.
#[derive(Debug, Clone, Default)]
pub struct LegacyTree {
    entries: HashMap<DbId, Entry>,
}

impl LegacyTree {
    pub fn build<T: LegacyNode>(nodes: &[T]) -> Self {
        let entries = nodes
            .iter()
            .map(|n| {
                (
                    n.node_id(),
                    Entry {
                        parent: n.parent_id(),
                        name: n.node_name().to_string(),
                        is_dir: n.is_dir(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Names of the directories above `node_id`, root first.
    ///
    /// Stops at a missing parent or when a parent link loops back.
    pub fn dir_path(&self, node_id: DbId) -> Vec<String> {
        let mut path = Vec::new();
        let mut seen = HashSet::from([node_id]);
        let mut cursor = self.entries.get(&node_id).and_then(|e| e.parent);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }
            let Some(entry) = self.entries.get(&id) else {
                break;
            };
            if entry.is_dir {
                path.push(entry.name.clone());
            }
            cursor = entry.parent;
        }
        path.reverse();
        path
    }
}

/// Legacy identifiers a case must wait for.
///
/// Scene snippet targets and output references count when they name
/// another case in `known`. Output references to the case's own task
/// aliases never do. Unknown names are left to the reference fix-up.
pub fn case_dependencies(
    own_identifier: &str,
    spec: &PipelineSpec,
    text: &str,
    known: &HashSet<String>,
) -> BTreeSet<String> {
    let aliases: HashSet<&str> = spec.actions().map(|(_, a)| a.alias.as_str()).collect();
    let outputs = referenced_names(text)
        .into_iter()
        .filter(|name| !aliases.contains(name));
    spec.snippet_targets()
        .into_iter()
        .chain(outputs)
        .filter(|name| *name != own_identifier && known.contains(*name))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
