//! Store seam and the in-memory property-graph driver.
//!
//! The engine consumes the [`GraphDriver`] trait: node/edge interning,
//! kind-restricted adjacency iteration, flags, metadata, secondary-index
//! enumeration, and scoped transactions. [`MemoryDriver`] is the provided
//! implementation — a `petgraph` [`StableDiGraph`] multigraph (indices stay
//! valid across edge removal) with hash-map secondary indices and an
//! undo-log transaction layer.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexSet;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GraphError, Result};
use crate::ident::{GroupArtifact, ProjectRef};
use crate::rel::{KindSet, Relationship};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable identifier of an interned coordinate node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable identifier of an interned relationship edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeId(pub(crate) u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Per-edge boolean flags persisted alongside the relationship record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeFlag {
    /// The edge was synthesized by a selector for one view; it is never
    /// followed on its own merit and is discarded at shutdown.
    Selection,
    /// The edge closes a known cycle; cycle-avoiding traversals skip it.
    CyclesInjected,
}

/// Result of interning an edge: its identifier and whether it was created by
/// this call (as opposed to found and source-merged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternedEdge {
    /// The edge identifier.
    pub id: EdgeId,
    /// `true` when the edge did not previously exist.
    pub created: bool,
}

// ---------------------------------------------------------------------------
// GraphDriver
// ---------------------------------------------------------------------------

/// The minimal store interface consumed by the engine.
///
/// Mutating calls made between [`tx_begin`](Self::tx_begin) and
/// [`tx_commit`](Self::tx_commit) must be reverted by
/// [`tx_abort`](Self::tx_abort), with one carve-out: deletions
/// ([`delete_edges_declared_by`](Self::delete_edges_declared_by),
/// [`drop_selection_edges`](Self::drop_selection_edges)) are issued by the
/// engine as single-operation transactions and need not be restorable.
pub trait GraphDriver: Send + Sync {
    /// Interns a coordinate, returning the existing node when already known.
    fn intern_node(&mut self, project: &ProjectRef) -> Result<NodeId>;

    /// Looks up a coordinate without creating it.
    fn lookup_node(&self, project: &ProjectRef) -> Option<NodeId>;

    /// The coordinate stored at `node`.
    fn project(&self, node: NodeId) -> Result<ProjectRef>;

    /// Every node currently in the store, in identifier order.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Interns an edge by identity key. Re-interning an existing edge unions
    /// its source URIs; `selection` only applies to newly created edges.
    fn intern_edge(&mut self, rel: &Relationship, selection: bool) -> Result<InternedEdge>;

    /// The relationship stored at `edge`.
    fn relationship(&self, edge: EdgeId) -> Result<Relationship>;

    /// The (declaring, target) node pair of `edge`.
    fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)>;

    /// Outgoing edges of `node` whose kind is in `kinds`.
    fn outgoing(&self, node: NodeId, kinds: KindSet) -> Result<Vec<EdgeId>>;

    /// Incoming edges of `node` whose kind is in `kinds`.
    fn incoming(&self, node: NodeId, kinds: KindSet) -> Result<Vec<EdgeId>>;

    /// Reads a per-edge flag.
    fn edge_flag(&self, edge: EdgeId, flag: EdgeFlag) -> Result<bool>;

    /// Writes a per-edge flag.
    fn set_edge_flag(&mut self, edge: EdgeId, flag: EdgeFlag, value: bool) -> Result<()>;

    /// `true` once the node has declared at least one outgoing edge (or a
    /// parent terminus was recorded for it).
    fn is_connected(&self, node: NodeId) -> Result<bool>;

    /// Marks the node as connected without adding an edge (terminus intake).
    fn mark_connected(&mut self, node: NodeId) -> Result<()>;

    /// The node's metadata map.
    fn metadata(&self, node: NodeId) -> Result<BTreeMap<String, String>>;

    /// Inserts or replaces one metadata entry.
    fn put_metadata(&mut self, node: NodeId, key: &str, value: &str) -> Result<()>;

    /// Replaces the node's whole metadata map.
    fn replace_metadata(&mut self, node: NodeId, map: BTreeMap<String, String>) -> Result<()>;

    /// Nodes carrying the given metadata key, in identifier order.
    fn nodes_with_metadata(&self, key: &str) -> Vec<NodeId>;

    /// Nodes with no outgoing declarations, in identifier order.
    fn missing_nodes(&self) -> Vec<NodeId>;

    /// Nodes whose coordinate has a non-literal version, in identifier order.
    fn variable_nodes(&self) -> Vec<NodeId>;

    /// Every edge currently in the store.
    fn all_edges(&self) -> Vec<EdgeId>;

    /// Every edge flagged as a selection edge.
    fn selection_edges(&self) -> Vec<EdgeId>;

    /// Every node whose coordinate has the given group:artifact pair.
    fn nodes_for_ga(&self, ga: &GroupArtifact) -> Vec<NodeId>;

    /// Removes every outgoing edge of `node` and clears its connected flag,
    /// returning the removed relationships.
    fn delete_edges_declared_by(&mut self, node: NodeId) -> Result<Vec<(EdgeId, Relationship)>>;

    /// Removes every selection edge, returning how many were dropped.
    fn drop_selection_edges(&mut self) -> Result<usize>;

    /// Starts recording an undo log for the following mutations.
    fn tx_begin(&mut self);

    /// Discards the undo log, keeping all recorded mutations.
    fn tx_commit(&mut self);

    /// Reverts every mutation recorded since [`tx_begin`](Self::tx_begin).
    fn tx_abort(&mut self);

    /// Shuts the driver down; subsequent mutations fail with
    /// [`GraphError::StoreClosed`].
    fn close(&mut self);

    /// `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// MemoryDriver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NodeRecord {
    project: ProjectRef,
    connected: bool,
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    rel: Relationship,
    selection: bool,
    cycles_injected: bool,
}

/// One reversible mutation, recorded while a transaction is open.
#[derive(Debug)]
enum UndoOp {
    NodeCreated(NodeId),
    EdgeCreated(EdgeId),
    SourcesWere(EdgeId, BTreeSet<Url>),
    FlagWas(EdgeId, EdgeFlag, bool),
    ConnectedWas(NodeId, bool),
    MetadataEntryWas(NodeId, String, Option<String>),
    MetadataMapWas(NodeId, BTreeMap<String, String>),
}

/// In-memory [`GraphDriver`] over a `petgraph` stable multigraph.
#[derive(Debug)]
pub struct MemoryDriver {
    graph: StableDiGraph<NodeRecord, EdgeRecord>,
    nodes_by_coord: HashMap<String, NodeId>,
    nodes_by_ga: HashMap<GroupArtifact, Vec<NodeId>>,
    edges_by_identity: HashMap<String, EdgeId>,
    selection: IndexSet<EdgeId>,
    metadata_index: HashMap<String, BTreeSet<NodeId>>,
    closed: bool,
    undo: Option<Vec<UndoOp>>,
}

fn nx(node: NodeId) -> NodeIndex {
    NodeIndex::new(node.0 as usize)
}

fn ex(edge: EdgeId) -> EdgeIndex {
    EdgeIndex::new(edge.0 as usize)
}

fn to_node_id(ix: NodeIndex) -> NodeId {
    NodeId(ix.index() as u32)
}

fn to_edge_id(ix: EdgeIndex) -> EdgeId {
    EdgeId(ix.index() as u32)
}

impl MemoryDriver {
    /// Creates an empty driver.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::with_capacity(0, 0),
            nodes_by_coord: HashMap::new(),
            nodes_by_ga: HashMap::new(),
            edges_by_identity: HashMap::new(),
            selection: IndexSet::new(),
            metadata_index: HashMap::new(),
            closed: false,
            undo: None,
        }
    }

    fn guard_open(&self) -> Result<()> {
        if self.closed {
            return Err(GraphError::StoreClosed);
        }
        Ok(())
    }

    fn record(&mut self, op: UndoOp) {
        if let Some(log) = &mut self.undo {
            log.push(op);
        }
    }

    fn node_record(&self, node: NodeId) -> Result<&NodeRecord> {
        self.graph
            .node_weight(nx(node))
            .ok_or(GraphError::UnknownNode(node))
    }

    fn node_record_mut(&mut self, node: NodeId) -> Result<&mut NodeRecord> {
        self.graph
            .node_weight_mut(nx(node))
            .ok_or(GraphError::UnknownNode(node))
    }

    fn edge_record(&self, edge: EdgeId) -> Result<&EdgeRecord> {
        self.graph
            .edge_weight(ex(edge))
            .ok_or(GraphError::UnknownEdge(edge))
    }

    fn edge_record_mut(&mut self, edge: EdgeId) -> Result<&mut EdgeRecord> {
        self.graph
            .edge_weight_mut(ex(edge))
            .ok_or(GraphError::UnknownEdge(edge))
    }

    fn adjacent(&self, node: NodeId, kinds: KindSet, dir: Direction) -> Result<Vec<EdgeId>> {
        // Touch the node first so unknown identifiers error instead of
        // silently yielding nothing.
        self.node_record(node)?;
        Ok(self
            .graph
            .edges_directed(nx(node), dir)
            .filter(|edge_ref| kinds.contains(edge_ref.weight().rel.kind()))
            .map(|edge_ref| to_edge_id(edge_ref.id()))
            .collect())
    }

    fn remove_edge_records(&mut self, edge: EdgeId) -> Option<EdgeRecord> {
        let record = self.graph.remove_edge(ex(edge))?;
        self.edges_by_identity.remove(&record.rel.identity_key());
        self.selection.shift_remove(&edge);
        Some(record)
    }

    fn undo_one(&mut self, op: UndoOp) {
        match op {
            UndoOp::NodeCreated(node) => {
                if let Some(record) = self.graph.remove_node(nx(node)) {
                    self.nodes_by_coord.remove(&record.project.to_string());
                    if let Some(ids) = self.nodes_by_ga.get_mut(&record.project.ga()) {
                        ids.retain(|&id| id != node);
                    }
                    for keyed in self.metadata_index.values_mut() {
                        keyed.remove(&node);
                    }
                }
            }
            UndoOp::EdgeCreated(edge) => {
                self.remove_edge_records(edge);
            }
            UndoOp::SourcesWere(edge, sources) => {
                if let Some(record) = self.graph.edge_weight_mut(ex(edge)) {
                    record.rel = record.rel.clone().with_sources(sources);
                }
            }
            UndoOp::FlagWas(edge, flag, value) => {
                if let Some(record) = self.graph.edge_weight_mut(ex(edge)) {
                    match flag {
                        EdgeFlag::Selection => {
                            record.selection = value;
                            if value {
                                self.selection.insert(edge);
                            } else {
                                self.selection.shift_remove(&edge);
                            }
                        }
                        EdgeFlag::CyclesInjected => record.cycles_injected = value,
                    }
                }
            }
            UndoOp::ConnectedWas(node, value) => {
                if let Some(record) = self.graph.node_weight_mut(nx(node)) {
                    record.connected = value;
                }
            }
            UndoOp::MetadataEntryWas(node, key, value) => {
                if let Some(record) = self.graph.node_weight_mut(nx(node)) {
                    match value {
                        Some(v) => {
                            record.metadata.insert(key.clone(), v);
                            self.metadata_index.entry(key).or_default().insert(node);
                        }
                        None => {
                            record.metadata.remove(&key);
                            if let Some(keyed) = self.metadata_index.get_mut(&key) {
                                keyed.remove(&node);
                            }
                        }
                    }
                }
            }
            UndoOp::MetadataMapWas(node, map) => {
                let current = match self.graph.node_weight(nx(node)) {
                    Some(record) => record.metadata.clone(),
                    None => return,
                };
                for key in current.keys() {
                    if let Some(keyed) = self.metadata_index.get_mut(key) {
                        keyed.remove(&node);
                    }
                }
                for key in map.keys() {
                    self.metadata_index
                        .entry(key.clone())
                        .or_default()
                        .insert(node);
                }
                if let Some(record) = self.graph.node_weight_mut(nx(node)) {
                    record.metadata = map;
                }
            }
        }
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphDriver for MemoryDriver {
    fn intern_node(&mut self, project: &ProjectRef) -> Result<NodeId> {
        self.guard_open()?;
        let canonical = project.to_string();
        if let Some(&id) = self.nodes_by_coord.get(&canonical) {
            return Ok(id);
        }
        let ix = self.graph.add_node(NodeRecord {
            project: project.clone(),
            connected: false,
            metadata: BTreeMap::new(),
        });
        let id = to_node_id(ix);
        self.nodes_by_coord.insert(canonical, id);
        self.nodes_by_ga.entry(project.ga()).or_default().push(id);
        self.record(UndoOp::NodeCreated(id));
        Ok(id)
    }

    fn lookup_node(&self, project: &ProjectRef) -> Option<NodeId> {
        self.nodes_by_coord.get(&project.to_string()).copied()
    }

    fn project(&self, node: NodeId) -> Result<ProjectRef> {
        Ok(self.node_record(node)?.project.clone())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.graph.node_indices().map(to_node_id).collect()
    }

    fn intern_edge(&mut self, rel: &Relationship, selection: bool) -> Result<InternedEdge> {
        self.guard_open()?;
        let identity = rel.identity_key();
        if let Some(&id) = self.edges_by_identity.get(&identity) {
            let existing = self.edge_record(id)?.rel.source_uris().clone();
            if !rel.source_uris().is_subset(&existing) {
                self.record(UndoOp::SourcesWere(id, existing));
                let record = self.edge_record_mut(id)?;
                record.rel = record
                    .rel
                    .clone()
                    .add_sources(rel.source_uris().iter().cloned());
            }
            return Ok(InternedEdge { id, created: false });
        }

        let declaring = self.intern_node(rel.declaring())?;
        let target = self.intern_node(rel.target())?;
        let ix = self.graph.add_edge(
            nx(declaring),
            nx(target),
            EdgeRecord {
                rel: rel.clone(),
                selection,
                cycles_injected: false,
            },
        );
        let id = to_edge_id(ix);
        self.edges_by_identity.insert(identity, id);
        self.record(UndoOp::EdgeCreated(id));
        if selection {
            self.selection.insert(id);
        } else {
            let was_connected = self.node_record(declaring)?.connected;
            if !was_connected {
                self.record(UndoOp::ConnectedWas(declaring, false));
                self.node_record_mut(declaring)?.connected = true;
            }
        }
        Ok(InternedEdge { id, created: true })
    }

    fn relationship(&self, edge: EdgeId) -> Result<Relationship> {
        Ok(self.edge_record(edge)?.rel.clone())
    }

    fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        self.graph
            .edge_endpoints(ex(edge))
            .map(|(a, b)| (to_node_id(a), to_node_id(b)))
            .ok_or(GraphError::UnknownEdge(edge))
    }

    fn outgoing(&self, node: NodeId, kinds: KindSet) -> Result<Vec<EdgeId>> {
        self.adjacent(node, kinds, Direction::Outgoing)
    }

    fn incoming(&self, node: NodeId, kinds: KindSet) -> Result<Vec<EdgeId>> {
        self.adjacent(node, kinds, Direction::Incoming)
    }

    fn edge_flag(&self, edge: EdgeId, flag: EdgeFlag) -> Result<bool> {
        let record = self.edge_record(edge)?;
        Ok(match flag {
            EdgeFlag::Selection => record.selection,
            EdgeFlag::CyclesInjected => record.cycles_injected,
        })
    }

    fn set_edge_flag(&mut self, edge: EdgeId, flag: EdgeFlag, value: bool) -> Result<()> {
        self.guard_open()?;
        let previous = self.edge_flag(edge, flag)?;
        if previous == value {
            return Ok(());
        }
        self.record(UndoOp::FlagWas(edge, flag, previous));
        match flag {
            EdgeFlag::Selection => {
                self.edge_record_mut(edge)?.selection = value;
                if value {
                    self.selection.insert(edge);
                } else {
                    self.selection.shift_remove(&edge);
                }
            }
            EdgeFlag::CyclesInjected => self.edge_record_mut(edge)?.cycles_injected = value,
        }
        Ok(())
    }

    fn is_connected(&self, node: NodeId) -> Result<bool> {
        Ok(self.node_record(node)?.connected)
    }

    fn mark_connected(&mut self, node: NodeId) -> Result<()> {
        self.guard_open()?;
        let was = self.node_record(node)?.connected;
        if !was {
            self.record(UndoOp::ConnectedWas(node, false));
            self.node_record_mut(node)?.connected = true;
        }
        Ok(())
    }

    fn metadata(&self, node: NodeId) -> Result<BTreeMap<String, String>> {
        Ok(self.node_record(node)?.metadata.clone())
    }

    fn put_metadata(&mut self, node: NodeId, key: &str, value: &str) -> Result<()> {
        self.guard_open()?;
        let previous = self.node_record(node)?.metadata.get(key).cloned();
        self.record(UndoOp::MetadataEntryWas(node, key.to_owned(), previous));
        self.node_record_mut(node)?
            .metadata
            .insert(key.to_owned(), value.to_owned());
        self.metadata_index
            .entry(key.to_owned())
            .or_default()
            .insert(node);
        Ok(())
    }

    fn replace_metadata(&mut self, node: NodeId, map: BTreeMap<String, String>) -> Result<()> {
        self.guard_open()?;
        let previous = self.node_record(node)?.metadata.clone();
        self.record(UndoOp::MetadataMapWas(node, previous.clone()));
        for key in previous.keys() {
            if let Some(keyed) = self.metadata_index.get_mut(key) {
                keyed.remove(&node);
            }
        }
        for key in map.keys() {
            self.metadata_index
                .entry(key.clone())
                .or_default()
                .insert(node);
        }
        self.node_record_mut(node)?.metadata = map;
        Ok(())
    }

    fn nodes_with_metadata(&self, key: &str) -> Vec<NodeId> {
        self.metadata_index
            .get(key)
            .map(|keyed| keyed.iter().copied().collect())
            .unwrap_or_default()
    }

    fn missing_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&ix| {
                self.graph
                    .node_weight(ix)
                    .is_some_and(|record| !record.connected)
            })
            .map(to_node_id)
            .collect()
    }

    fn variable_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&ix| {
                self.graph
                    .node_weight(ix)
                    .is_some_and(|record| record.project.is_variable())
            })
            .map(to_node_id)
            .collect()
    }

    fn all_edges(&self) -> Vec<EdgeId> {
        self.graph.edge_indices().map(to_edge_id).collect()
    }

    fn selection_edges(&self) -> Vec<EdgeId> {
        self.selection.iter().copied().collect()
    }

    fn nodes_for_ga(&self, ga: &GroupArtifact) -> Vec<NodeId> {
        self.nodes_by_ga.get(ga).cloned().unwrap_or_default()
    }

    fn delete_edges_declared_by(&mut self, node: NodeId) -> Result<Vec<(EdgeId, Relationship)>> {
        self.guard_open()?;
        self.node_record(node)?;
        let ids: Vec<EdgeId> = self
            .graph
            .edges_directed(nx(node), Direction::Outgoing)
            .map(|edge_ref| to_edge_id(edge_ref.id()))
            .collect();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.remove_edge_records(id) {
                removed.push((id, record.rel));
            }
        }
        self.node_record_mut(node)?.connected = false;
        Ok(removed)
    }

    fn drop_selection_edges(&mut self) -> Result<usize> {
        self.guard_open()?;
        let ids: Vec<EdgeId> = self.selection.iter().copied().collect();
        let mut dropped = 0;
        for id in ids {
            if self.remove_edge_records(id).is_some() {
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    fn tx_begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    fn tx_commit(&mut self) {
        self.undo = None;
    }

    fn tx_abort(&mut self) {
        if let Some(log) = self.undo.take() {
            for op in log.into_iter().rev() {
                self.undo_one(op);
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::rel::RelationshipKind;
    use crate::test_helpers::{dep, loc, pref};

    /// Interning the same coordinate twice yields the same node.
    #[test]
    fn test_intern_node_idempotent() {
        let mut driver = MemoryDriver::new();
        let a = driver.intern_node(&pref("g:a:1")).expect("interns");
        let b = driver.intern_node(&pref("g:a:1")).expect("interns");
        assert_eq!(a, b);
        assert_eq!(driver.node_ids().len(), 1);
    }

    /// Interning an edge creates both endpoints and marks the declaring node
    /// connected; the target stays missing.
    #[test]
    fn test_intern_edge_creates_endpoints() {
        let mut driver = MemoryDriver::new();
        let interned = driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        assert!(interned.created);

        let a = driver.lookup_node(&pref("g:a:1")).expect("a exists");
        let b = driver.lookup_node(&pref("g:b:1")).expect("b exists");
        assert!(driver.is_connected(a).expect("known node"));
        assert!(!driver.is_connected(b).expect("known node"));
        assert_eq!(driver.missing_nodes(), vec![b]);
    }

    /// Re-interning an identical edge unions sources instead of duplicating.
    #[test]
    fn test_intern_edge_unions_sources() {
        let mut driver = MemoryDriver::new();
        let first = driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        let again = dep("g:a:1", "g:b:1", 0).add_source(loc("http://mirror.example/a.pom"));
        let second = driver.intern_edge(&again, false).expect("interns");
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        let rel = driver.relationship(first.id).expect("known edge");
        assert_eq!(rel.source_uris().len(), 2);
        assert_eq!(driver.all_edges().len(), 1);
    }

    /// Kind-restricted adjacency only yields matching edges.
    #[test]
    fn test_outgoing_kind_restriction() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        let a = driver.lookup_node(&pref("g:a:1")).expect("a exists");
        assert_eq!(
            driver
                .outgoing(a, KindSet::of(&[RelationshipKind::Dependency]))
                .expect("known node")
                .len(),
            1
        );
        assert!(
            driver
                .outgoing(a, KindSet::of(&[RelationshipKind::Parent]))
                .expect("known node")
                .is_empty()
        );
    }

    /// Variable-version nodes are tracked by the variable index.
    #[test]
    fn test_variable_nodes_index() {
        let mut driver = MemoryDriver::new();
        driver.intern_node(&pref("g:a:1")).expect("interns");
        let v = driver
            .intern_node(&pref("g:b:[1.0,2.0)"))
            .expect("interns");
        assert_eq!(driver.variable_nodes(), vec![v]);
    }

    /// Aborting a transaction removes created nodes and edges and restores
    /// merged sources.
    #[test]
    fn test_tx_abort_rolls_back() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");

        driver.tx_begin();
        driver
            .intern_edge(&dep("g:b:1", "g:c:1", 0), false)
            .expect("interns");
        let merged = dep("g:a:1", "g:b:1", 0).add_source(loc("http://mirror.example/a.pom"));
        driver.intern_edge(&merged, false).expect("interns");
        driver.tx_abort();

        assert_eq!(driver.node_ids().len(), 2, "g:c:1 rolled back");
        assert_eq!(driver.all_edges().len(), 1);
        assert!(driver.lookup_node(&pref("g:c:1")).is_none());
        let a = driver.lookup_node(&pref("g:a:1")).expect("a exists");
        let edge = driver
            .outgoing(a, KindSet::ALL)
            .expect("known node")
            .first()
            .copied()
            .expect("one edge");
        assert_eq!(
            driver
                .relationship(edge)
                .expect("known edge")
                .source_uris()
                .len(),
            1,
            "source union rolled back"
        );
    }

    /// Committing a transaction keeps the mutations.
    #[test]
    fn test_tx_commit_keeps_mutations() {
        let mut driver = MemoryDriver::new();
        driver.tx_begin();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        driver.tx_commit();
        assert_eq!(driver.all_edges().len(), 1);
    }

    /// Selection edges are indexed, do not connect the declaring node, and
    /// are dropped wholesale.
    #[test]
    fn test_selection_edges() {
        let mut driver = MemoryDriver::new();
        let interned = driver
            .intern_edge(&dep("g:a:1", "g:b:2", 0), true)
            .expect("interns");
        assert!(
            driver
                .edge_flag(interned.id, EdgeFlag::Selection)
                .expect("known edge")
        );
        assert_eq!(driver.selection_edges(), vec![interned.id]);

        let a = driver.lookup_node(&pref("g:a:1")).expect("a exists");
        assert!(
            !driver.is_connected(a).expect("known node"),
            "selection edges do not declare"
        );

        assert_eq!(driver.drop_selection_edges().expect("open"), 1);
        assert!(driver.all_edges().is_empty());
    }

    /// Deleting declared edges returns them and re-missings the declarer.
    #[test]
    fn test_delete_edges_declared_by() {
        let mut driver = MemoryDriver::new();
        driver
            .intern_edge(&dep("g:a:1", "g:b:1", 0), false)
            .expect("interns");
        driver
            .intern_edge(&dep("g:a:1", "g:c:1", 1), false)
            .expect("interns");
        let a = driver.lookup_node(&pref("g:a:1")).expect("a exists");

        let removed = driver.delete_edges_declared_by(a).expect("deletes");
        assert_eq!(removed.len(), 2);
        assert!(driver.all_edges().is_empty());
        assert!(!driver.is_connected(a).expect("known node"));
        assert_eq!(driver.missing_nodes().len(), 3);
    }

    /// Metadata writes maintain the per-key index; replace clears stale keys.
    #[test]
    fn test_metadata_index() {
        let mut driver = MemoryDriver::new();
        let a = driver.intern_node(&pref("g:a:1")).expect("interns");
        driver.put_metadata(a, "team", "core").expect("writes");
        assert_eq!(driver.nodes_with_metadata("team"), vec![a]);

        driver
            .replace_metadata(a, BTreeMap::from([("owner".to_owned(), "x".to_owned())]))
            .expect("writes");
        assert!(driver.nodes_with_metadata("team").is_empty());
        assert_eq!(driver.nodes_with_metadata("owner"), vec![a]);
    }

    /// A closed driver refuses mutations.
    #[test]
    fn test_closed_driver_refuses_mutations() {
        let mut driver = MemoryDriver::new();
        driver.close();
        assert!(matches!(
            driver.intern_node(&pref("g:a:1")),
            Err(GraphError::StoreClosed)
        ));
    }

    /// The GA index groups all versions of the same group:artifact pair.
    #[test]
    fn test_ga_index() {
        let mut driver = MemoryDriver::new();
        let v1 = driver.intern_node(&pref("g:a:1")).expect("interns");
        let v2 = driver.intern_node(&pref("g:a:2")).expect("interns");
        driver.intern_node(&pref("g:b:1")).expect("interns");
        let ga = pref("g:a:1").ga();
        assert_eq!(driver.nodes_for_ga(&ga), vec![v1, v2]);
    }
}
