//! The relationship-graph engine facade.
//!
//! [`RelationshipGraph`] owns the store driver and every registered view
//! behind one `RwLock`: mutations serialize on the write lock, reads run
//! concurrently on the read lock and upgrade only when a view cache is dirty
//! (lazy materialization). Every mutation runs inside a scoped driver
//! transaction that commits on success and aborts on any other exit path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, warn};

use crate::cache::ViewUpdater;
use crate::cycles::{Cycle, CycleCacheUpdater, CycleRecord};
use crate::error::{GraphError, Result};
use crate::filter::RelationshipFilter;
use crate::ident::{GroupArtifact, ProjectRef, VersionSpec};
use crate::path::{PathInfo, SelectorState};
use crate::rel::{KindSet, Relationship, RelationshipKind};
use crate::store::{EdgeFlag, EdgeId, GraphDriver, MemoryDriver, NodeId};
use crate::traverse::{self, TraversalOptions, TraversalOrder, TraversalSpec, Uniqueness};
use crate::view::{self, ViewParams, ViewState};
use url::Url;

fn unknown_view(id: &str) -> GraphError {
    GraphError::InvalidArgument(format!("unknown view: {id}"))
}

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

struct Inner<D> {
    driver: D,
    views: IndexMap<String, ViewState>,
}

impl<D: GraphDriver> Inner<D> {
    fn view(&self, id: &str) -> Result<&ViewState> {
        self.views.get(id).ok_or_else(|| unknown_view(id))
    }

    fn view_mut(&mut self, id: &str) -> Result<&mut ViewState> {
        self.views.get_mut(id).ok_or_else(|| unknown_view(id))
    }

    /// Rebuilds the view's cache from its roots under its current filter,
    /// selector, and selection table.
    fn materialize(&mut self, id: &str) -> Result<()> {
        let Inner { driver, views } = self;
        let view = views.get_mut(id).ok_or_else(|| unknown_view(id))?;
        view.touch();
        view.cache.clear();
        driver.tx_begin();
        match Self::run_materialize(driver, view) {
            Ok(cycles_seen) => {
                driver.tx_commit();
                view.dirty = false;
                if cycles_seen {
                    view.cycle_pending = true;
                }
                debug!(
                    view = %view.short_id,
                    nodes = view.cache.nodes().len(),
                    edges = view.cache.edges().len(),
                    paths = view.cache.path_count(),
                    "materialized view cache"
                );
                Ok(())
            }
            Err(err) => {
                driver.tx_abort();
                view.cache.clear();
                view.dirty = true;
                Err(err)
            }
        }
    }

    fn run_materialize(driver: &mut D, view: &mut ViewState) -> Result<bool> {
        let ViewState {
            short_id,
            params,
            selections,
            cache,
            ..
        } = view;
        let mut roots = Vec::new();
        for root in params.roots() {
            let node = driver.intern_node(root)?;
            if !roots.iter().any(|(existing, _)| *existing == node) {
                roots.push((
                    node,
                    PathInfo::new(
                        short_id.as_str(),
                        params.filter().clone(),
                        SelectorState::default(),
                    ),
                ));
            }
        }
        let spec = TraversalSpec {
            view_id: short_id.as_str(),
            selector: params.selector(),
            selections,
            kinds: params.filter().kinds(),
        };
        let mut updater = ViewUpdater::new(cache);
        traverse::traverse(
            driver,
            &roots,
            &spec,
            TraversalOptions {
                order: TraversalOrder::BreadthFirst,
                uniqueness: Uniqueness::RelationshipPath,
                avoid_cycles: false,
                sorted: true,
            },
            &mut updater,
        )?;
        Ok(updater.cycles_seen)
    }

    fn materialize_if_dirty(&mut self, id: &str) -> Result<()> {
        if self.view(id)?.dirty {
            self.materialize(id)?;
        }
        Ok(())
    }

    /// Runs the lazy cycle scan when the view's cycle cache is pending, then
    /// flags every injector edge in the store.
    fn rebuild_cycles(&mut self, id: &str) -> Result<()> {
        self.materialize_if_dirty(id)?;
        let Inner { driver, views } = self;
        let view = views.get_mut(id).ok_or_else(|| unknown_view(id))?;
        if !view.cycle_pending {
            return Ok(());
        }
        driver.tx_begin();
        let scanned = (|| -> Result<Vec<CycleRecord>> {
            let mut roots = Vec::new();
            for root in view.params.roots() {
                let node = driver.intern_node(root)?;
                if !roots.iter().any(|(existing, _)| *existing == node) {
                    roots.push((
                        node,
                        PathInfo::new(
                            &view.short_id,
                            view.params.filter().clone(),
                            SelectorState::default(),
                        ),
                    ));
                }
            }
            let spec = TraversalSpec {
                view_id: &view.short_id,
                selector: view.params.selector(),
                selections: &view.selections,
                kinds: view.params.filter().kinds(),
            };
            let mut updater = CycleCacheUpdater::default();
            traverse::traverse(
                driver,
                &roots,
                &spec,
                TraversalOptions {
                    order: TraversalOrder::DepthFirst,
                    uniqueness: Uniqueness::RelationshipPath,
                    avoid_cycles: false,
                    sorted: true,
                },
                &mut updater,
            )?;
            for record in &updater.records {
                driver.set_edge_flag(record.injector, EdgeFlag::CyclesInjected, true)?;
            }
            Ok(updater.records)
        })();
        match scanned {
            Ok(records) => {
                driver.tx_commit();
                debug!(view = %view.short_id, cycles = records.len(), "rebuilt cycle cache");
                view.cycles = records;
                view.cycle_pending = false;
                Ok(())
            }
            Err(err) => {
                driver.tx_abort();
                Err(err)
            }
        }
    }

    fn resolve_projects(&self, nodes: impl IntoIterator<Item = NodeId>) -> Result<Vec<ProjectRef>> {
        let mut out = Vec::new();
        for node in nodes {
            out.push(self.driver.project(node)?);
        }
        out.sort();
        Ok(out)
    }

    fn resolve_edges(&self, edges: impl IntoIterator<Item = EdgeId>) -> Result<Vec<Relationship>> {
        let mut out = Vec::new();
        for edge in edges {
            out.push(self.driver.relationship(edge)?);
        }
        out.sort_by_key(|rel| {
            (
                rel.declaring().to_string(),
                rel.kind().priority(),
                rel.index(),
                rel.target().to_string(),
            )
        });
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// RelationshipGraph
// ---------------------------------------------------------------------------

/// The engine: a shared store driver plus registered views and their caches.
///
/// Shareable across threads behind an `Arc`; all mutating operations
/// serialize on an internal write lock while clean-cache reads proceed
/// concurrently.
pub struct RelationshipGraph<D: GraphDriver = MemoryDriver> {
    inner: RwLock<Inner<D>>,
}

impl RelationshipGraph<MemoryDriver> {
    /// Opens an engine over a fresh in-memory driver.
    pub fn in_memory() -> Self {
        Self::with_driver(MemoryDriver::new())
    }
}

impl<D: GraphDriver> RelationshipGraph<D> {
    /// Opens an engine over the given driver.
    pub fn with_driver(driver: D) -> Self {
        Self {
            inner: RwLock::new(Inner {
                driver,
                views: IndexMap::new(),
            }),
        }
    }

    /// Read-path helper: answers from a clean cache under the read lock,
    /// upgrading to materialize first when the view is dirty.
    fn with_view<R>(
        &self,
        view_id: &str,
        f: impl FnOnce(&Inner<D>, &ViewState) -> Result<R>,
    ) -> Result<R> {
        let guard = self.inner.upgradable_read();
        if guard.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        if guard.view(view_id)?.dirty {
            let mut writer = RwLockUpgradableReadGuard::upgrade(guard);
            writer.materialize(view_id)?;
            let view = writer.view(view_id)?;
            return f(&writer, view);
        }
        let view = guard.view(view_id)?;
        f(&guard, view)
    }

    // -----------------------------------------------------------------------
    // View registration and configuration
    // -----------------------------------------------------------------------

    /// Registers a view and materializes its cache, returning the stable
    /// short identifier. Registering an identical configuration twice
    /// resolves to the existing view.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphError::InvalidArgument`] when `params` has no roots:
    /// a view without roots cannot track membership.
    pub fn register_view(&self, params: ViewParams) -> Result<String> {
        if params.roots().is_empty() {
            return Err(GraphError::InvalidArgument(
                "a view requires at least one root project".to_owned(),
            ));
        }
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let id = view::short_id(&params);
        if !inner.views.contains_key(&id) {
            inner
                .views
                .insert(id.clone(), ViewState::new(id.clone(), params));
        }
        inner.materialize_if_dirty(&id)?;
        Ok(id)
    }

    /// Drops a view and its caches.
    pub fn deregister_view(&self, view_id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner
            .views
            .shift_remove(view_id)
            .map(|_| ())
            .ok_or_else(|| unknown_view(view_id))
    }

    /// Short identifiers of every registered view, in registration order.
    pub fn view_ids(&self) -> Vec<String> {
        self.inner.read().views.keys().cloned().collect()
    }

    /// Registers an ad-hoc version selection on a view: every path through
    /// another version of `ga` is rebuilt under the new selection, so the
    /// choice propagates to downstream paths. The underlying edges are left
    /// untouched; substitutes are interned as selection edges.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphError::SelectionConflict`] when a substituted edge
    /// would close a loop; the selection is rolled back.
    pub fn register_view_selection(
        &self,
        view_id: &str,
        ga: GroupArtifact,
        version: VersionSpec,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let view = inner.view_mut(view_id)?;
        let previous = view.selections.insert(ga.clone(), version);
        view.dirty = true;
        view.cycle_pending = true;
        // Materialize eagerly so a conflicting selection fails the caller
        // that registered it.
        match inner.materialize(view_id) {
            Ok(()) => Ok(()),
            Err(err) => {
                let view = inner.view_mut(view_id)?;
                match previous {
                    Some(v) => view.selections.insert(ga, v),
                    None => view.selections.remove(&ga),
                };
                view.dirty = true;
                Err(err)
            }
        }
    }

    /// Adds a free-form key/value property to a view.
    pub fn set_view_property(&self, view_id: &str, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner
            .view_mut(view_id)?
            .properties
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// Reads one view property.
    pub fn view_property(&self, view_id: &str, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read();
        Ok(inner.view(view_id)?.properties.get(key).cloned())
    }

    /// The view's full property map.
    pub fn view_properties(&self, view_id: &str) -> Result<BTreeMap<String, String>> {
        let inner = self.inner.read();
        Ok(inner.view(view_id)?.properties.clone())
    }

    /// Records an active source URI on the view.
    pub fn add_active_source(&self, view_id: &str, source: Url) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner.view_mut(view_id)?.active_sources.insert(source);
        Ok(())
    }

    /// The view's active source URIs.
    pub fn active_sources(&self, view_id: &str) -> Result<BTreeSet<Url>> {
        let inner = self.inner.read();
        Ok(inner.view(view_id)?.active_sources.clone())
    }

    /// Records an active POM location on the view.
    pub fn add_active_pom_location(&self, view_id: &str, location: Url) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner
            .view_mut(view_id)?
            .active_pom_locations
            .insert(location);
        Ok(())
    }

    /// The view's active POM locations.
    pub fn active_pom_locations(&self, view_id: &str) -> Result<BTreeSet<Url>> {
        let inner = self.inner.read();
        Ok(inner.view(view_id)?.active_pom_locations.clone())
    }

    /// When the view was registered or last materialized.
    pub fn last_access(&self, view_id: &str) -> Result<SystemTime> {
        let inner = self.inner.read();
        Ok(inner.view(view_id)?.last_access)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Ingests a batch of relationships.
    ///
    /// The returned rejection list is always empty: cycle detection is
    /// deferred, and cycles surface later through
    /// [`get_cycles`](Self::get_cycles). Parent terminus markers
    /// (declaring == target) record parsed-but-leaf state instead of edges.
    /// A node-creation failure for one relationship is logged and skips that
    /// relationship while its siblings commit; any other failure aborts the
    /// whole batch.
    pub fn add_relationships(&self, rels: &[Relationship]) -> Result<Vec<Relationship>> {
        self.add_relationships_suppressing(rels, &[])
    }

    /// [`add_relationships`](Self::add_relationships), leaving the views in
    /// `suppressed` out of re-materialization marking.
    pub fn add_relationships_suppressing(
        &self,
        rels: &[Relationship],
        suppressed: &[&str],
    ) -> Result<Vec<Relationship>> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let Inner { driver, views } = &mut *inner;

        let mut new_edges: Vec<(EdgeId, NodeId)> = Vec::new();
        driver.tx_begin();
        let ingested = (|| -> Result<()> {
            for rel in rels {
                if rel.is_terminus() {
                    let node = driver.intern_node(rel.declaring())?;
                    driver.mark_connected(node)?;
                    continue;
                }
                let declaring = match driver.intern_node(rel.declaring()) {
                    Ok(node) => node,
                    Err(err) => {
                        if let GraphError::InvalidVersion { project, reason } = &err {
                            warn!(%project, %reason, "dropping relationship: declaring coordinate rejected");
                            continue;
                        }
                        return Err(err);
                    }
                };
                match driver.intern_node(rel.target()) {
                    Ok(_) => {}
                    Err(err) => {
                        if let GraphError::InvalidVersion { project, reason } = &err {
                            warn!(%project, %reason, "dropping relationship: target coordinate rejected");
                            continue;
                        }
                        return Err(err);
                    }
                }
                let interned = driver.intern_edge(rel, false)?;
                if interned.created {
                    new_edges.push((interned.id, declaring));
                }
            }
            Ok(())
        })();
        match ingested {
            Ok(()) => driver.tx_commit(),
            Err(err) => {
                driver.tx_abort();
                return Err(err);
            }
        }

        for view in views.values_mut() {
            if suppressed.contains(&view.short_id.as_str()) {
                continue;
            }
            if new_edges
                .iter()
                .any(|&(_, declaring)| view.cache.contains_node(declaring))
            {
                view.dirty = true;
                view.cycle_pending = true;
            }
        }
        Ok(Vec::new())
    }

    /// Removes every relationship declared by `project`, returning them.
    /// The project re-enters the missing set; views that contained it keep
    /// their membership but lose the removed edges and every cached path
    /// crossing them.
    pub fn delete_relationships_declared_by(
        &self,
        project: &ProjectRef,
    ) -> Result<Vec<Relationship>> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let Inner { driver, views } = &mut *inner;
        let Some(node) = driver.lookup_node(project) else {
            return Ok(Vec::new());
        };
        driver.tx_begin();
        let removed = match driver.delete_edges_declared_by(node) {
            Ok(removed) => {
                driver.tx_commit();
                removed
            }
            Err(err) => {
                driver.tx_abort();
                return Err(err);
            }
        };
        let removed_ids: Vec<EdgeId> = removed.iter().map(|&(id, _)| id).collect();
        // Deleted edges and their paths are uncached, but membership stays:
        // nodes are never destroyed, they re-enter the missing set instead.
        for view in views.values_mut() {
            if view.cache.contains_node(node) {
                view.cache.remove_edges(&removed_ids);
                view.cycle_pending = true;
            }
        }
        Ok(removed.into_iter().map(|(_, rel)| rel).collect())
    }

    /// Writes one metadata entry on a project, creating its node on first
    /// reference.
    pub fn add_metadata(&self, project: &ProjectRef, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let driver = &mut inner.driver;
        driver.tx_begin();
        let written = (|| {
            let node = driver.intern_node(project)?;
            driver.put_metadata(node, key, value)
        })();
        match written {
            Ok(()) => {
                driver.tx_commit();
                Ok(())
            }
            Err(err) => {
                driver.tx_abort();
                Err(err)
            }
        }
    }

    /// Replaces a project's whole metadata map.
    pub fn set_metadata(
        &self,
        project: &ProjectRef,
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let driver = &mut inner.driver;
        driver.tx_begin();
        let written = (|| {
            let node = driver.intern_node(project)?;
            driver.replace_metadata(node, metadata)
        })();
        match written {
            Ok(()) => {
                driver.tx_commit();
                Ok(())
            }
            Err(err) => {
                driver.tx_abort();
                Err(err)
            }
        }
    }

    /// Drops all session-scoped selection edges and closes the store. Every
    /// subsequent operation fails with [`GraphError::StoreClosed`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        let dropped = inner.driver.drop_selection_edges()?;
        inner.driver.close();
        debug!(selection_edges = dropped, "closed relationship graph");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every project reachable in the view (roots included), sorted.
    pub fn all_projects(&self, view_id: &str) -> Result<Vec<ProjectRef>> {
        self.with_view(view_id, |inner, view| {
            inner.resolve_projects(view.cache.nodes().iter().copied())
        })
    }

    /// Every relationship crossed by at least one accepted path, sorted by
    /// declaring coordinate, kind, index, and target.
    pub fn all_relationships(&self, view_id: &str) -> Result<Vec<Relationship>> {
        self.with_view(view_id, |inner, view| {
            inner.resolve_edges(view.cache.edges().iter().copied())
        })
    }

    /// `true` when the project is part of the view.
    pub fn contains_project(&self, view_id: &str, project: &ProjectRef) -> Result<bool> {
        self.with_view(view_id, |inner, view| {
            Ok(inner
                .driver
                .lookup_node(project)
                .is_some_and(|node| view.cache.contains_node(node)))
        })
    }

    /// Every accepted root path ending at `project`, each resolved to its
    /// relationship sequence (a root yields one empty sequence).
    pub fn all_paths_to(
        &self,
        view_id: &str,
        project: &ProjectRef,
    ) -> Result<Vec<Vec<Relationship>>> {
        self.with_view(view_id, |inner, view| {
            let Some(node) = inner.driver.lookup_node(project) else {
                return Ok(Vec::new());
            };
            let mut out = Vec::new();
            for key in view.cache.paths_to(node) {
                let mut rels = Vec::with_capacity(key.path.len());
                for rid in key.path.rids() {
                    rels.push(inner.driver.relationship(rid)?);
                }
                out.push(rels);
            }
            Ok(out)
        })
    }

    /// [`all_paths_to`](Self::all_paths_to) over several targets at once.
    pub fn path_map_targeting(
        &self,
        view_id: &str,
        projects: &[ProjectRef],
    ) -> Result<BTreeMap<ProjectRef, Vec<Vec<Relationship>>>> {
        let mut out = BTreeMap::new();
        for project in projects {
            out.insert(project.clone(), self.all_paths_to(view_id, project)?);
        }
        Ok(out)
    }

    /// Direct relationships declared by `project`, filtered through the view
    /// and the managed/concrete reporting flags.
    pub fn direct_from(
        &self,
        view_id: &str,
        project: &ProjectRef,
        include_managed: bool,
        include_concrete: bool,
        kinds: KindSet,
    ) -> Result<Vec<Relationship>> {
        self.direct_neighbors(view_id, project, include_managed, include_concrete, kinds, true)
    }

    /// Direct relationships targeting `project`, filtered through the view
    /// and the managed/concrete reporting flags.
    pub fn direct_to(
        &self,
        view_id: &str,
        project: &ProjectRef,
        include_managed: bool,
        include_concrete: bool,
        kinds: KindSet,
    ) -> Result<Vec<Relationship>> {
        self.direct_neighbors(view_id, project, include_managed, include_concrete, kinds, false)
    }

    fn direct_neighbors(
        &self,
        view_id: &str,
        project: &ProjectRef,
        include_managed: bool,
        include_concrete: bool,
        kinds: KindSet,
        outgoing: bool,
    ) -> Result<Vec<Relationship>> {
        self.with_view(view_id, |inner, view| {
            let Some(node) = inner.driver.lookup_node(project) else {
                return Ok(Vec::new());
            };
            let edges = if outgoing {
                inner.driver.outgoing(node, kinds)?
            } else {
                inner.driver.incoming(node, kinds)?
            };
            let mut keep = Vec::new();
            for edge in edges {
                // Selection edges only surface in the view that chose them.
                if inner.driver.edge_flag(edge, EdgeFlag::Selection)?
                    && !view.cache.contains_edge(edge)
                {
                    continue;
                }
                let (declaring, target) = inner.driver.endpoints(edge)?;
                if !view.cache.contains_node(declaring) || !view.cache.contains_node(target) {
                    continue;
                }
                let rel = inner.driver.relationship(edge)?;
                if rel.is_managed() && !include_managed {
                    continue;
                }
                if rel.is_concrete() && !include_concrete {
                    continue;
                }
                keep.push(edge);
            }
            inner.resolve_edges(keep)
        })
    }

    /// Projects of the view with no outgoing declarations, sorted.
    pub fn missing_projects(&self, view_id: &str) -> Result<Vec<ProjectRef>> {
        self.with_view(view_id, |inner, view| {
            inner.resolve_projects(
                inner
                    .driver
                    .missing_nodes()
                    .into_iter()
                    .filter(|&node| view.cache.contains_node(node)),
            )
        })
    }

    /// Projects of the view whose version is still variable, sorted.
    pub fn variable_projects(&self, view_id: &str) -> Result<Vec<ProjectRef>> {
        self.with_view(view_id, |inner, view| {
            inner.resolve_projects(
                inner
                    .driver
                    .variable_nodes()
                    .into_iter()
                    .filter(|&node| view.cache.contains_node(node)),
            )
        })
    }

    /// `true` when the project has declared at least one outgoing edge (or a
    /// terminus marker). Unknown projects are not connected.
    pub fn is_connected(&self, project: &ProjectRef) -> Result<bool> {
        let inner = self.inner.read();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        match inner.driver.lookup_node(project) {
            Some(node) => inner.driver.is_connected(node),
            None => Ok(false),
        }
    }

    /// `true` when the project is known but has no outgoing declarations.
    pub fn is_missing(&self, project: &ProjectRef) -> Result<bool> {
        let inner = self.inner.read();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        match inner.driver.lookup_node(project) {
            Some(node) => Ok(!inner.driver.is_connected(node)?),
            None => Ok(false),
        }
    }

    /// `true` when the coordinate's version is a range or expression,
    /// consulting the interned node when one exists.
    pub fn is_variable(&self, project: &ProjectRef) -> Result<bool> {
        let inner = self.inner.read();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        match inner.driver.lookup_node(project) {
            Some(node) => Ok(inner.driver.project(node)?.is_variable()),
            None => Ok(project.is_variable()),
        }
    }

    /// The PARENT chain upward from `project`, following only parent edges
    /// visible to the view, stopping at a leaf, a missing parent, or a
    /// revisit. The chain starts with `project` itself.
    pub fn ancestry_of(&self, view_id: &str, project: &ProjectRef) -> Result<Vec<ProjectRef>> {
        self.with_view(view_id, |inner, view| {
            let Some(start) = inner.driver.lookup_node(project) else {
                return Ok(Vec::new());
            };
            if !view.cache.contains_node(start) {
                return Ok(Vec::new());
            }
            let mut chain = vec![inner.driver.project(start)?];
            let mut visited: HashSet<NodeId> = HashSet::from([start]);
            let mut current = start;
            loop {
                let parents = inner
                    .driver
                    .outgoing(current, KindSet::of(&[RelationshipKind::Parent]))?;
                let mut next: Option<(u32, EdgeId)> = None;
                for edge in parents {
                    if !view.cache.contains_edge(edge) {
                        continue;
                    }
                    let index = inner.driver.relationship(edge)?.index();
                    if next.is_none_or(|(best, _)| index < best) {
                        next = Some((index, edge));
                    }
                }
                let Some((_, edge)) = next else { break };
                let (_, target) = inner.driver.endpoints(edge)?;
                if !visited.insert(target) {
                    break;
                }
                chain.push(inner.driver.project(target)?);
                current = target;
            }
            Ok(chain)
        })
    }

    /// A project's metadata map (empty for unknown projects).
    pub fn get_metadata(&self, project: &ProjectRef) -> Result<BTreeMap<String, String>> {
        let inner = self.inner.read();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        match inner.driver.lookup_node(project) {
            Some(node) => inner.driver.metadata(node),
            None => Ok(BTreeMap::new()),
        }
    }

    /// One metadata value.
    pub fn get_metadata_value(&self, project: &ProjectRef, key: &str) -> Result<Option<String>> {
        Ok(self.get_metadata(project)?.get(key).cloned())
    }

    /// Projects of the view carrying the given metadata key, sorted.
    pub fn projects_with_metadata(&self, view_id: &str, key: &str) -> Result<Vec<ProjectRef>> {
        self.with_view(view_id, |inner, view| {
            inner.resolve_projects(
                inner
                    .driver
                    .nodes_with_metadata(key)
                    .into_iter()
                    .filter(|&node| view.cache.contains_node(node)),
            )
        })
    }

    /// `true` iff some cached path of the view ending at the edge's declaring
    /// project passes through its target — adding the edge would close a
    /// loop.
    pub fn introduces_cycle(&self, view_id: &str, rel: &Relationship) -> Result<bool> {
        self.with_view(view_id, |inner, view| {
            let Some(declaring) = inner.driver.lookup_node(rel.declaring()) else {
                return Ok(false);
            };
            let Some(target) = inner.driver.lookup_node(rel.target()) else {
                return Ok(false);
            };
            Ok(view.cache.paths_to(declaring).into_iter().any(|key| {
                view.cache
                    .record(key)
                    .is_some_and(|record| record.nodes.contains(&target))
            }))
        })
    }

    /// Every cycle reachable from the view's roots. Lazily rebuilt: the scan
    /// runs only when edges changed since the last request.
    pub fn get_cycles(&self, view_id: &str) -> Result<Vec<Cycle>> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner.rebuild_cycles(view_id)?;
        let view = inner.view(view_id)?;
        let mut cycles = Vec::with_capacity(view.cycles.len());
        for record in &view.cycles {
            let mut relationships = Vec::with_capacity(record.path.len());
            for rid in record.path.rids() {
                relationships.push(inner.driver.relationship(rid)?);
            }
            let mut projects = Vec::with_capacity(record.nodes.len());
            for &node in &record.nodes {
                projects.push(inner.driver.project(node)?);
            }
            cycles.push(Cycle {
                relationships,
                projects,
            });
        }
        Ok(cycles)
    }

    /// `true` when the project sits on any cached cycle of the view.
    pub fn is_cycle_participant(&self, view_id: &str, project: &ProjectRef) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.driver.is_closed() {
            return Err(GraphError::StoreClosed);
        }
        inner.rebuild_cycles(view_id)?;
        let Some(node) = inner.driver.lookup_node(project) else {
            return Ok(false);
        };
        Ok(inner
            .view(view_id)?
            .cycles
            .iter()
            .any(|record| record.nodes.contains(&node)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
