//! Lazy, per-view cycle detection and caching.
//!
//! Each view carries a cycle cache and a pending flag. When cycles are
//! requested on a pending view, the engine walks it with a cycle-cache
//! updater that records every minimal back-edge cycle reachable
//! from the roots; injector edges are then flagged in the store so
//! cycle-avoiding traversals skip them without re-deriving the cycle. A cycle
//! is encoded as the path tail from the first occurrence of the
//! re-encountered node up to the injecting edge, so its first and last nodes
//! are equal.

use crate::ident::ProjectRef;
use crate::path::{Path, PathInfo};
use crate::rel::Relationship;
use crate::store::{EdgeId, NodeId};
use crate::traverse::TraversalVisitor;

// ---------------------------------------------------------------------------
// Records and results
// ---------------------------------------------------------------------------

/// Engine-internal record of one detected cycle.
#[derive(Debug, Clone)]
pub(crate) struct CycleRecord {
    /// The cyclic path tail; its last edge is the injector.
    pub path: Path,
    /// The edge that closed the loop.
    pub injector: EdgeId,
    /// Node sequence of the cycle; first and last entries are equal.
    pub nodes: Vec<NodeId>,
}

/// A detected cycle, resolved for callers: the edge sequence and the node
/// sequence (first project equals last project).
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// The relationships forming the loop, in traversal order.
    pub relationships: Vec<Relationship>,
    /// The projects on the loop; the first and last entries are equal.
    pub projects: Vec<ProjectRef>,
}

// ---------------------------------------------------------------------------
// CycleCacheUpdater
// ---------------------------------------------------------------------------

/// Traversal visitor that collects every minimal back-edge cycle.
///
/// Ordinary emissions are ignored; only `cycle_detected` callbacks are
/// recorded, deduplicated by cyclic path.
#[derive(Default)]
pub(crate) struct CycleCacheUpdater {
    pub records: Vec<CycleRecord>,
}

impl TraversalVisitor for CycleCacheUpdater {
    fn including_child(
        &mut self,
        _edge: EdgeId,
        _rel: &Relationship,
        _trail: &[NodeId],
        _path: &Path,
        _info: &PathInfo,
        _parent: &Path,
    ) {
        // Cycle scans only care about back-edges.
    }

    fn cycle_detected(&mut self, cycle: &Path, injector: EdgeId, trail: &[NodeId]) {
        if self.records.iter().any(|record| record.path == *cycle) {
            return;
        }
        self.records.push(CycleRecord {
            path: cycle.clone(),
            injector,
            nodes: trail.to_vec(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::collections::BTreeMap;

    use super::*;
    use crate::path::SelectorState;
    use crate::rel::KindSet;
    use crate::store::{GraphDriver, MemoryDriver};
    use crate::test_helpers::{dep, pref};
    use crate::traverse::{self, TraversalOptions, TraversalOrder, TraversalSpec};
    use crate::{filter, select};

    fn scan(driver: &mut MemoryDriver, root: &str) -> Vec<CycleRecord> {
        let node = driver.intern_node(&pref(root)).expect("interns root");
        let roots = vec![(
            node,
            PathInfo::new("v", filter::any(), SelectorState::default()),
        )];
        let selector = select::noop();
        let selections = BTreeMap::new();
        let spec = TraversalSpec {
            view_id: "v",
            selector: &selector,
            selections: &selections,
            kinds: KindSet::ALL,
        };
        let mut updater = CycleCacheUpdater::default();
        traverse::traverse(
            driver,
            &roots,
            &spec,
            TraversalOptions {
                order: TraversalOrder::DepthFirst,
                sorted: true,
                ..TraversalOptions::default()
            },
            &mut updater,
        )
        .expect("scan succeeds");
        updater.records
    }

    /// A two-node loop yields one record whose trail closes on itself.
    #[test]
    fn test_two_node_cycle_record() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:b:1", "g:a:1", 0), false)
            .expect("interns");

        let records = scan(&mut driver, "g:a:1");
        assert_eq!(records.len(), 1);
        let record = records.first().expect("one record");
        assert_eq!(record.path.len(), 2);
        assert_eq!(record.nodes.first(), record.nodes.last());
        assert_eq!(record.path.last_rid(), Some(record.injector));
    }

    /// An acyclic diamond yields no records.
    #[test]
    fn test_acyclic_graph_has_no_records() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:a:1", "g:c:1", 1), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:b:1", "g:d:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:c:1", "g:d:1", 0), false)
            .expect("interns");

        assert!(scan(&mut driver, "g:a:1").is_empty());
    }

    /// A self-loop is a one-edge cycle.
    #[test]
    fn test_self_loop() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:a:1", 0), false)
            .expect("interns");

        let records = scan(&mut driver, "g:a:1");
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().expect("one record").path.len(), 1);
    }

    /// Duplicate reports of the same cyclic tail are collapsed.
    #[test]
    fn test_duplicate_cycles_deduplicated() {
        let mut driver = MemoryDriver::new();
        // Two routes into the same b<->c loop.
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:a:1", "g:c:1", 1), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:b:1", "g:c:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:c:1", "g:b:1", 0), false)
            .expect("interns");

        let records = scan(&mut driver, "g:a:1");
        // The loop is seen from both entry points, but each cyclic tail is
        // recorded once.
        assert_eq!(records.len(), 2);
        let keys: Vec<String> = records.iter().map(|r| r.path.key()).collect();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys, deduped);
    }
}
