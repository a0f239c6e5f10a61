//! Frontier traversal over typed relationship edges.
//!
//! The engine walks outgoing edges from a set of roots, breadth- or
//! depth-first. Every candidate edge passes through the same gauntlet: the
//! cycle-injector skip, the view's selection table and selector, and the
//! filter carried in the current [`PathInfo`]. Accepted edges are emitted to
//! a [`TraversalVisitor`] together with their extended [`Path`]; back-edges
//! are reported through [`TraversalVisitor::cycle_detected`] instead of being
//! expanded, so cyclic graphs terminate.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::trace;

use crate::error::{GraphError, Result};
use crate::ident::{GroupArtifact, VersionSpec};
use crate::path::{Path, PathInfo};
use crate::rel::{KindSet, Relationship};
use crate::select::{RelationshipSelector, Selection, SelectorRef};
use crate::store::{EdgeFlag, EdgeId, GraphDriver, NodeId};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Expansion order of the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// First-in first-out frontier.
    #[default]
    BreadthFirst,
    /// Last-in first-out frontier.
    DepthFirst,
}

/// What makes two visits of the same edge redundant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Uniqueness {
    /// Every distinct root-to-edge path is visited once (path-cache builds).
    #[default]
    RelationshipPath,
    /// Every edge is crossed at most once, whatever the path (global scans).
    RelationshipGlobal,
}

/// Per-pass traversal options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalOptions {
    /// Frontier order.
    pub order: TraversalOrder,
    /// Redundancy rule.
    pub uniqueness: Uniqueness,
    /// When `true`, edges flagged as cycle injectors are skipped outright;
    /// when `false`, back-edges are reported via `cycle_detected`.
    pub avoid_cycles: bool,
    /// When `true`, candidates expand in
    /// `(kind priority, declaring, index, target)` order.
    pub sorted: bool,
}

/// View-derived context a traversal pass runs under.
pub struct TraversalSpec<'a> {
    /// Short id of the owning view (for error attribution).
    pub view_id: &'a str,
    /// The view's configured selector.
    pub selector: &'a SelectorRef,
    /// The view's registered selection table, consulted before the selector.
    pub selections: &'a BTreeMap<GroupArtifact, VersionSpec>,
    /// Kind narrowing implied by the view's root filter.
    pub kinds: KindSet,
}

// ---------------------------------------------------------------------------
// Visitor
// ---------------------------------------------------------------------------

/// Capability set consumed by the traversal engine.
///
/// Concrete visitors (the view-cache updater, the cycle-cache updater) are
/// alternative implementations of this trait, not subclasses of a common
/// engine; all methods except [`including_child`](Self::including_child)
/// have defaults.
pub trait TraversalVisitor {
    /// Called once per root before expansion starts.
    fn initialize_path_info(&mut self, root: NodeId, path: &Path, info: &PathInfo) {
        let _ = (root, path, info);
    }

    /// Gate on expanding a node's children.
    fn include_children(&self, path: &Path, info: &PathInfo) -> bool {
        let _ = (path, info);
        true
    }

    /// Deduplication: `true` when the visitor has already recorded this path.
    fn has_seen(&self, root: NodeId, path: &Path) -> bool {
        let _ = (root, path);
        false
    }

    /// An accepted edge, with the extended path, its info, the node trail
    /// (root to the new target, inclusive), and the parent path.
    fn including_child(
        &mut self,
        edge: EdgeId,
        rel: &Relationship,
        trail: &[NodeId],
        path: &Path,
        info: &PathInfo,
        parent: &Path,
    );

    /// Gate on enqueuing the accepted edge's target for further expansion.
    fn is_enabled_for(&self, path: &Path) -> bool {
        let _ = path;
        true
    }

    /// A back-edge closed a loop: `cycle` is the path tail from the first
    /// occurrence of the re-encountered node up to the injecting edge.
    fn cycle_detected(&mut self, cycle: &Path, injector: EdgeId, trail: &[NodeId]) {
        let _ = (cycle, injector, trail);
    }

    /// Hook for redundant-path suppression. No in-tree policy consults it
    /// yet; it exists so visitors can opt in once one is specified.
    fn should_avoid_redundant_paths(&self) -> bool {
        false
    }

    /// Called once after the frontier drains.
    fn traverse_complete(&mut self) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct Frame {
    root: NodeId,
    node: NodeId,
    path: Path,
    info: PathInfo,
    trail: Vec<NodeId>,
}

/// Runs one traversal pass from `roots` under `spec`, emitting to `visitor`.
///
/// The driver is mutable because selector substitution interns selection
/// edges as it goes.
pub fn traverse<D: GraphDriver, V: TraversalVisitor>(
    driver: &mut D,
    roots: &[(NodeId, PathInfo)],
    spec: &TraversalSpec<'_>,
    opts: TraversalOptions,
    visitor: &mut V,
) -> Result<()> {
    let mut frontier: VecDeque<Frame> = VecDeque::new();
    let mut crossed: HashSet<EdgeId> = HashSet::new();

    for (root, info) in roots {
        let path = Path::new();
        visitor.initialize_path_info(*root, &path, info);
        frontier.push_back(Frame {
            root: *root,
            node: *root,
            path,
            info: info.clone(),
            trail: vec![*root],
        });
    }

    loop {
        let frame = match opts.order {
            TraversalOrder::BreadthFirst => frontier.pop_front(),
            TraversalOrder::DepthFirst => frontier.pop_back(),
        };
        let Some(frame) = frame else { break };

        if !visitor.include_children(&frame.path, &frame.info) {
            continue;
        }

        let mut candidates = driver.outgoing(frame.node, spec.kinds)?;
        if opts.sorted {
            sort_candidates(driver, &mut candidates)?;
        }

        for edge in candidates {
            if opts.avoid_cycles && driver.edge_flag(edge, EdgeFlag::CyclesInjected)? {
                continue;
            }

            let original = driver.relationship(edge)?;
            let is_selection = driver.edge_flag(edge, EdgeFlag::Selection)?;

            let (decision, explicitly_chosen) =
                select_for(spec, &original, &frame.path, &frame.info);
            let (eff_edge, eff_rel) = match decision {
                Selection::Reject => continue,
                Selection::Keep => {
                    // A selection edge is never followed on its own merit.
                    if is_selection && !explicitly_chosen {
                        continue;
                    }
                    (edge, original)
                }
                Selection::Substitute(substitute) => {
                    if let Some(target) = driver.lookup_node(substitute.target()) {
                        if frame.trail.contains(&target) {
                            return Err(GraphError::SelectionConflict {
                                view: spec.view_id.to_owned(),
                                project: substitute.target().to_string(),
                            });
                        }
                    }
                    let interned = driver.intern_edge(&substitute, true)?;
                    (interned.id, substitute)
                }
            };

            if matches!(opts.uniqueness, Uniqueness::RelationshipGlobal)
                && !crossed.insert(eff_edge)
            {
                continue;
            }

            let next_state = spec.selector.next_state(&eff_rel, frame.info.state());
            let Some(child_info) = frame.info.child(&eff_rel, &frame.path, next_state) else {
                continue;
            };

            let (_, target) = driver.endpoints(eff_edge)?;
            let new_path = frame.path.append(eff_edge);

            if !opts.avoid_cycles {
                if let Some(pos) = frame.trail.iter().position(|&n| n == target) {
                    let rids = new_path.rids();
                    let cycle = Path::from_rids(&rids[pos..]);
                    let mut cycle_trail = frame.trail[pos..].to_vec();
                    cycle_trail.push(target);
                    trace!(edge = %eff_edge, "back-edge closes a cycle");
                    visitor.cycle_detected(&cycle, eff_edge, &cycle_trail);
                    continue;
                }
            }

            if visitor.has_seen(frame.root, &new_path) {
                continue;
            }

            let mut trail = frame.trail.clone();
            trail.push(target);
            visitor.including_child(eff_edge, &eff_rel, &trail, &new_path, &child_info, &frame.path);

            if !visitor.is_enabled_for(&new_path) {
                continue;
            }
            frontier.push_back(Frame {
                root: frame.root,
                node: target,
                path: new_path,
                info: child_info,
                trail,
            });
        }
    }

    visitor.traverse_complete();
    Ok(())
}

/// Consults the view's selection table first, then the configured selector.
///
/// The second component is `true` when the decision explicitly chose the
/// edge's target version (a registered selection), which licenses following
/// an edge flagged as a selection edge.
fn select_for(
    spec: &TraversalSpec<'_>,
    rel: &Relationship,
    path: &Path,
    info: &PathInfo,
) -> (Selection, bool) {
    if let Some(version) = spec.selections.get(&rel.target().ga()) {
        if rel.target().version() == version {
            return (Selection::Keep, true);
        }
        let substitute = rel.select_target(rel.target().with_version(version.clone()));
        return (Selection::Substitute(substitute), true);
    }
    let decision = spec.selector.select(rel, path, info.state());
    let explicit = matches!(decision, Selection::Substitute(_));
    (decision, explicit)
}

/// Orders candidate edges by `(kind priority, declaring, index, target)`.
fn sort_candidates<D: GraphDriver>(driver: &D, candidates: &mut Vec<EdgeId>) -> Result<()> {
    let mut keyed = Vec::with_capacity(candidates.len());
    for &edge in candidates.iter() {
        let rel = driver.relationship(edge)?;
        keyed.push((
            rel.kind().priority(),
            rel.declaring().to_string(),
            rel.index(),
            rel.target().to_string(),
            edge,
        ));
    }
    keyed.sort();
    *candidates = keyed.into_iter().map(|(_, _, _, _, edge)| edge).collect();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
