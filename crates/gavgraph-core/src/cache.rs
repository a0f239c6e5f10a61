//! Per-view caches of nodes, edges, and accepted root paths.
//!
//! A view owns three collections: cached nodes (membership), cached edges
//! (edges crossed by at least one accepted path), and cached paths (every
//! accepted root-to-node path with its terminal [`PathInfo`]). Paths are
//! additionally indexed by the nodes they end at and the nodes they pass
//! through, so "all paths targeting X" queries are O(result size). Maps are
//! insertion-ordered, which together with sorted traversal makes query
//! output deterministic.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::path::{Path, PathInfo};
use crate::rel::Relationship;
use crate::store::{EdgeId, NodeId};
use crate::traverse::TraversalVisitor;

// ---------------------------------------------------------------------------
// Keys and records
// ---------------------------------------------------------------------------

/// Cache key of one accepted path: the root it starts at plus the edge
/// sequence. The root disambiguates the empty paths of multi-root views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    /// The root node the path starts at.
    pub root: NodeId,
    /// The edge sequence.
    pub path: Path,
}

/// A cached path record: the terminal info plus the node trail (root to
/// target, inclusive).
#[derive(Debug, Clone)]
pub struct CachedPath {
    /// Filter/selector state at the end of the path.
    pub info: PathInfo,
    /// Every node the path touches, in order.
    pub nodes: Vec<NodeId>,
}

impl CachedPath {
    /// The node the path ends at (the root itself for empty paths).
    pub fn target(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

// ---------------------------------------------------------------------------
// ViewCache
// ---------------------------------------------------------------------------

/// The three per-view caches plus the two path indices.
#[derive(Debug, Default)]
pub struct ViewCache {
    nodes: IndexSet<NodeId>,
    edges: IndexSet<EdgeId>,
    paths: IndexMap<PathKey, CachedPath>,
    by_target: HashMap<NodeId, IndexSet<PathKey>>,
    by_contains: HashMap<NodeId, IndexSet<PathKey>>,
}

impl ViewCache {
    /// Empties every collection (start of re-materialization).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.paths.clear();
        self.by_target.clear();
        self.by_contains.clear();
    }

    /// Seeds a root: membership plus the synthetic empty path.
    pub fn insert_root(&mut self, root: NodeId, info: PathInfo) {
        let key = PathKey {
            root,
            path: Path::new(),
        };
        self.index_path(&key, &[root]);
        self.paths.insert(
            key,
            CachedPath {
                info,
                nodes: vec![root],
            },
        );
    }

    /// Records one accepted path: its terminal edge, every touched node, and
    /// the `{path → info}` entry with both secondary indices.
    pub fn insert_path(&mut self, key: PathKey, info: PathInfo, trail: &[NodeId]) {
        if let Some(rid) = key.path.last_rid() {
            self.edges.insert(rid);
        }
        self.index_path(&key, trail);
        self.paths.insert(
            key,
            CachedPath {
                info,
                nodes: trail.to_vec(),
            },
        );
    }

    fn index_path(&mut self, key: &PathKey, trail: &[NodeId]) {
        for &node in trail {
            self.nodes.insert(node);
            self.by_contains
                .entry(node)
                .or_default()
                .insert(key.clone());
        }
        if let Some(&target) = trail.last() {
            self.by_target.entry(target).or_default().insert(key.clone());
        }
    }

    /// Uncaches deleted edges: drops them from the edge set and removes
    /// every cached path crossing one, fixing both indices. Node membership
    /// is retained — nodes are never destroyed, they only fall back into the
    /// missing set.
    pub fn remove_edges(&mut self, removed: &[EdgeId]) {
        if removed.is_empty() {
            return;
        }
        for edge in removed {
            self.edges.shift_remove(edge);
        }
        let doomed: Vec<PathKey> = self
            .paths
            .keys()
            .filter(|key| removed.iter().any(|&edge| key.path.contains_rid(edge)))
            .cloned()
            .collect();
        for key in doomed {
            if let Some(record) = self.paths.shift_remove(&key) {
                let target = record.nodes.last().copied();
                for node in record.nodes {
                    if let Some(keys) = self.by_contains.get_mut(&node) {
                        keys.shift_remove(&key);
                    }
                }
                if let Some(target) = target {
                    if let Some(keys) = self.by_target.get_mut(&target) {
                        keys.shift_remove(&key);
                    }
                }
            }
        }
    }

    /// Cached node membership.
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Cached edge membership.
    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    /// `true` when the exact path is already cached.
    pub fn contains_path(&self, key: &PathKey) -> bool {
        self.paths.contains_key(key)
    }

    /// All cached nodes, in insertion order.
    pub fn nodes(&self) -> &IndexSet<NodeId> {
        &self.nodes
    }

    /// All cached edges, in insertion order.
    pub fn edges(&self) -> &IndexSet<EdgeId> {
        &self.edges
    }

    /// The full path map.
    pub fn paths(&self) -> &IndexMap<PathKey, CachedPath> {
        &self.paths
    }

    /// Every cached path ending at `node`, in insertion order.
    pub fn paths_to(&self, node: NodeId) -> Vec<&PathKey> {
        self.by_target
            .get(&node)
            .map(|keys| keys.iter().collect())
            .unwrap_or_default()
    }

    /// Every cached path passing through `node`, in insertion order.
    pub fn paths_through(&self, node: NodeId) -> Vec<&PathKey> {
        self.by_contains
            .get(&node)
            .map(|keys| keys.iter().collect())
            .unwrap_or_default()
    }

    /// The record cached for `key`.
    pub fn record(&self, key: &PathKey) -> Option<&CachedPath> {
        self.paths.get(key)
    }

    /// Number of cached paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }
}

// ---------------------------------------------------------------------------
// ViewUpdater
// ---------------------------------------------------------------------------

/// Traversal visitor that materializes a [`ViewCache`].
///
/// Every accepted emission appends the edge to the running path, writes the
/// `{path → info}` record, and inserts the edge and its endpoints into the
/// edge and node caches. Back-edges flip `cycles_seen` so the owning view can
/// mark its cycle cache pending.
pub(crate) struct ViewUpdater<'a> {
    pub cache: &'a mut ViewCache,
    pub cycles_seen: bool,
}

impl<'a> ViewUpdater<'a> {
    pub fn new(cache: &'a mut ViewCache) -> Self {
        Self {
            cache,
            cycles_seen: false,
        }
    }
}

impl TraversalVisitor for ViewUpdater<'_> {
    fn initialize_path_info(&mut self, root: NodeId, _path: &Path, info: &PathInfo) {
        self.cache.insert_root(root, info.clone());
    }

    fn has_seen(&self, root: NodeId, path: &Path) -> bool {
        self.cache.contains_path(&PathKey {
            root,
            path: path.clone(),
        })
    }

    fn including_child(
        &mut self,
        _edge: EdgeId,
        _rel: &Relationship,
        trail: &[NodeId],
        path: &Path,
        info: &PathInfo,
        _parent: &Path,
    ) {
        let Some(&root) = trail.first() else { return };
        self.cache.insert_path(
            PathKey {
                root,
                path: path.clone(),
            },
            info.clone(),
            trail,
        );
    }

    fn cycle_detected(&mut self, _cycle: &Path, _injector: EdgeId, _trail: &[NodeId]) {
        self.cycles_seen = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
