//! Sibling ordering through `pre_id` chains.
//!
//! Scene sets, scenes and steps are ordered by a "previous sibling" link:
//! the head has `pre_id == 0` and every other entity points at the one
//! before it. Steps carry two interleaved chains, a serial chain of heads
//! and, hanging off each head, a parallel chain of children.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::step::PreType;
use crate::types::{DbId, CHAIN_HEAD};

/// An entity linked into a sibling chain.
pub trait Chained {
    fn id(&self) -> DbId;
    fn pre_id(&self) -> DbId;
}

/// A step linked into the serial/parallel chains of its scene.
pub trait ChainedStep: Chained {
    fn pre_type(&self) -> PreType;
}

/// A serial step with the parallel steps that run beside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepGroup<T> {
    pub head: T,
    pub children: Vec<T>,
}

/// Index entities by `pre_id`, rejecting two entities on the same link.
fn index_by_pre<'a, T: Chained>(
    items: impl Iterator<Item = &'a T>,
    what: &str,
) -> Result<HashMap<DbId, &'a T>, CoreError>
where
    T: 'a,
{
    let mut by_pre = HashMap::new();
    for item in items {
        if let Some(other) = by_pre.insert(item.pre_id(), item) {
            return Err(CoreError::Validation(format!(
                "broken {what} chain: {} and {} both follow {}",
                other.id(),
                item.id(),
                item.pre_id()
            )));
        }
    }
    Ok(by_pre)
}

/// Follow links from `start` until the chain ends.
fn walk<'a, T: Chained>(
    by_pre: &HashMap<DbId, &'a T>,
    start: DbId,
    seen: &mut HashSet<DbId>,
    what: &str,
) -> Result<Vec<&'a T>, CoreError> {
    let mut out = Vec::new();
    let mut cursor = start;
    while let Some(&item) = by_pre.get(&cursor) {
        if !seen.insert(item.id()) {
            return Err(CoreError::Validation(format!(
                "broken {what} chain: cycle through {}",
                item.id()
            )));
        }
        out.push(item);
        cursor = item.id();
    }
    Ok(out)
}

/// Order siblings by walking the chain from its head.
///
/// Fails when two siblings share a link, when the chain cycles, or when
/// some sibling is not reachable from the head.
pub fn order_chain<T: Chained + Clone>(items: &[T], what: &str) -> Result<Vec<T>, CoreError> {
    let by_pre = index_by_pre(items.iter(), what)?;
    let mut seen = HashSet::new();
    let ordered = walk(&by_pre, CHAIN_HEAD, &mut seen, what)?;
    if ordered.len() != items.len() {
        return Err(CoreError::Validation(format!(
            "broken {what} chain: {} of {} entities unreachable from the head",
            items.len() - ordered.len(),
            items.len()
        )));
    }
    Ok(ordered.into_iter().cloned().collect())
}

/// Order a scene's steps into serial groups with their parallel children.
pub fn group_steps<T: ChainedStep + Clone>(steps: &[T]) -> Result<Vec<StepGroup<T>>, CoreError> {
    let serial = index_by_pre(
        steps.iter().filter(|s| s.pre_type() == PreType::Serial),
        "serial step",
    )?;
    let parallel = index_by_pre(
        steps.iter().filter(|s| s.pre_type() == PreType::Parallel),
        "parallel step",
    )?;

    let mut seen = HashSet::new();
    let heads = walk(&serial, CHAIN_HEAD, &mut seen, "serial step")?;
    let mut groups = Vec::with_capacity(heads.len());
    for head in heads {
        let children = walk(&parallel, head.id(), &mut seen, "parallel step")?;
        groups.push(StepGroup {
            head: head.clone(),
            children: children.into_iter().cloned().collect(),
        });
    }

    if seen.len() != steps.len() {
        return Err(CoreError::Validation(format!(
            "broken step chain: {} of {} steps unreachable from the head",
            steps.len() - seen.len(),
            steps.len()
        )));
    }
    Ok(groups)
}

/// Flatten groups back into execution order (head, then its children).
pub fn flatten_groups<T>(groups: Vec<StepGroup<T>>) -> Vec<T> {
    groups
        .into_iter()
        .flat_map(|g| std::iter::once(g.head).chain(g.children))
        .collect()
}

/// Relink siblings into name order.
///
/// Siblings are sorted by name, equal names by ID. Returns `(id, pre_id)`
/// for every sibling whose link has to change.
pub fn sorted_links<T, F>(items: &[T], name_of: F) -> Vec<(DbId, DbId)>
where
    T: Chained,
    F: Fn(&T) -> &str,
{
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| name_of(a).cmp(name_of(b)).then(a.id().cmp(&b.id())));

    let mut changes = Vec::new();
    let mut pre = CHAIN_HEAD;
    for item in sorted {
        if item.pre_id() != pre {
            changes.push((item.id(), pre));
        }
        pre = item.id();
    }
    changes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        id: DbId,
        pre: DbId,
        pre_type: PreType,
    }

    impl Chained for Node {
        fn id(&self) -> DbId {
            self.id
        }
        fn pre_id(&self) -> DbId {
            self.pre
        }
    }

    impl ChainedStep for Node {
        fn pre_type(&self) -> PreType {
            self.pre_type
        }
    }

    fn serial(id: DbId, pre: DbId) -> Node {
        Node {
            id,
            pre,
            pre_type: PreType::Serial,
        }
    }

    fn parallel(id: DbId, pre: DbId) -> Node {
        Node {
            id,
            pre,
            pre_type: PreType::Parallel,
        }
    }

    fn ids(nodes: &[Node]) -> Vec<DbId> {
        nodes.iter().map(|n| n.id).collect()
    }

    // -- order_chain ----------------------------------------------------------

    #[test]
    fn orders_shuffled_chain() {
        let items = vec![serial(3, 2), serial(1, 0), serial(2, 1)];
        assert_eq!(ids(&order_chain(&items, "scene").unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(order_chain::<Node>(&[], "scene").unwrap().is_empty());
    }

    #[test]
    fn rejects_two_heads() {
        let items = vec![serial(1, 0), serial(2, 0)];
        assert!(order_chain(&items, "scene").is_err());
    }

    #[test]
    fn rejects_detached_cycle() {
        let items = vec![serial(1, 0), serial(2, 3), serial(3, 2)];
        let err = order_chain(&items, "scene").unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("unreachable")));
    }

    // -- group_steps ----------------------------------------------------------

    #[test]
    fn groups_parallel_children_under_heads() {
        // 10 -> 20 serial; 11, 12 parallel under 10; 21 parallel under 20.
        let steps = vec![
            parallel(12, 11),
            serial(20, 10),
            parallel(11, 10),
            serial(10, 0),
            parallel(21, 20),
        ];
        let groups = group_steps(&steps).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].head.id, 10);
        assert_eq!(ids(&groups[0].children), vec![11, 12]);
        assert_eq!(ids(&groups[1].children), vec![21]);
        assert_eq!(ids(&flatten_groups(groups)), vec![10, 11, 12, 20, 21]);
    }

    #[test]
    fn orphan_parallel_step_is_rejected() {
        let steps = vec![serial(1, 0), parallel(5, 99)];
        assert!(group_steps(&steps).is_err());
    }

    // -- sorted_links ---------------------------------------------------------

    #[test]
    fn sorted_links_relink_by_name_then_id() {
        let items = vec![serial(1, 0), serial(2, 1), serial(3, 2)];
        // Sorted: 2 ("a"), 3 ("a"), 1 ("b").
        let changes = sorted_links(&items, |n| if n.id == 1 { "b" } else { "a" });
        assert_eq!(changes, vec![(2, 0), (1, 3)]);
    }

    #[test]
    fn sorted_chain_needs_no_changes() {
        let items = vec![serial(1, 0), serial(2, 1)];
        assert!(sorted_links(&items, |n| if n.id == 1 { "a" } else { "b" }).is_empty());
    }
}
