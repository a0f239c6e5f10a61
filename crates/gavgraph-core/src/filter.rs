//! Composable relationship filters with child-filter narrowing.
//!
//! A filter is a pure predicate over a relationship and its traversal
//! context. Accepting an edge yields the *child filter* that governs edges
//! expanded from the target, so filters narrow as traversal descends (the
//! scope filter is the canonical example: after the first dependency hop only
//! transitive scopes remain admissible). Filters also report the set of
//! relationship kinds they can ever accept, which the traversal engine uses
//! to narrow the store's edge iteration.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::path::{Path, PathInfo};
use crate::rel::{DependencyScope, KindSet, Relationship, RelationshipKind};

/// Shared handle to a filter.
pub type FilterRef = Arc<dyn RelationshipFilter>;

/// Predicate over a relationship plus its traversal context.
///
/// Implementations must be pure functions of their arguments.
pub trait RelationshipFilter: fmt::Debug + Send + Sync {
    /// Returns the child filter when the edge is accepted, `None` to reject.
    fn accept(&self, rel: &Relationship, path: &Path, info: &PathInfo) -> Option<FilterRef>;

    /// The relationship kinds this filter can ever accept.
    fn kinds(&self) -> KindSet;

    /// A stable descriptor string, persisted on the view and hashed into the
    /// view short-id.
    fn describe(&self) -> String;
}

/// Accepts every relationship; the root filter of unconstrained views.
pub fn any() -> FilterRef {
    Arc::new(AcceptAll)
}

/// Rejects every relationship.
pub fn none() -> FilterRef {
    Arc::new(AcceptNone)
}

/// Accepts relationships whose kind is in `set`.
pub fn kinds(set: KindSet) -> FilterRef {
    Arc::new(KindFilter { set })
}

/// Accepts dependency relationships in the given scopes, optionally admitting
/// managed declarations; child positions narrow to transitive scopes.
pub fn scopes(accepted: BTreeSet<DependencyScope>, include_managed: bool) -> FilterRef {
    Arc::new(ScopeFilter {
        accepted,
        include_managed,
    })
}

/// Accepts when every inner filter accepts; the child is the conjunction of
/// the inner child filters.
pub fn all_of(filters: Vec<FilterRef>) -> FilterRef {
    Arc::new(AllOfFilter { filters })
}

/// Accepts when at least one inner filter accepts; the child is the
/// disjunction of the child filters of the accepting branches.
pub fn any_of(filters: Vec<FilterRef>) -> FilterRef {
    Arc::new(AnyOfFilter { filters })
}

/// Inverts a filter's verdict. The child filter is the same negation.
pub fn not(filter: FilterRef) -> FilterRef {
    Arc::new(NotFilter { inner: filter })
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct AcceptAll;

impl RelationshipFilter for AcceptAll {
    fn accept(&self, _rel: &Relationship, _path: &Path, _info: &PathInfo) -> Option<FilterRef> {
        Some(any())
    }

    fn kinds(&self) -> KindSet {
        KindSet::ALL
    }

    fn describe(&self) -> String {
        "any".to_owned()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AcceptNone;

impl RelationshipFilter for AcceptNone {
    fn accept(&self, _rel: &Relationship, _path: &Path, _info: &PathInfo) -> Option<FilterRef> {
        None
    }

    fn kinds(&self) -> KindSet {
        KindSet::EMPTY
    }

    fn describe(&self) -> String {
        "none".to_owned()
    }
}

#[derive(Debug, Clone)]
struct KindFilter {
    set: KindSet,
}

impl RelationshipFilter for KindFilter {
    fn accept(&self, rel: &Relationship, _path: &Path, _info: &PathInfo) -> Option<FilterRef> {
        if self.set.contains(rel.kind()) {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }

    fn kinds(&self) -> KindSet {
        self.set
    }

    fn describe(&self) -> String {
        format!("kinds({})", self.set)
    }
}

#[derive(Debug, Clone)]
struct ScopeFilter {
    accepted: BTreeSet<DependencyScope>,
    include_managed: bool,
}

impl RelationshipFilter for ScopeFilter {
    fn accept(&self, rel: &Relationship, _path: &Path, _info: &PathInfo) -> Option<FilterRef> {
        if rel.kind() != RelationshipKind::Dependency {
            return None;
        }
        if rel.is_managed() && !self.include_managed {
            return None;
        }
        let scope = rel.scope().unwrap_or_default();
        if !self.accepted.contains(&scope) {
            return None;
        }
        // Beyond the first hop only transitive scopes continue.
        let transitive: BTreeSet<DependencyScope> = self
            .accepted
            .iter()
            .copied()
            .filter(|s| s.is_transitive())
            .chain([DependencyScope::Compile, DependencyScope::Runtime])
            .collect();
        Some(Arc::new(ScopeFilter {
            accepted: transitive,
            include_managed: self.include_managed,
        }))
    }

    fn kinds(&self) -> KindSet {
        KindSet::of(&[RelationshipKind::Dependency])
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self
            .accepted
            .iter()
            .map(|scope| scope.as_str())
            .collect();
        format!(
            "scopes({};managed={})",
            names.join(","),
            self.include_managed
        )
    }
}

#[derive(Debug, Clone)]
struct AllOfFilter {
    filters: Vec<FilterRef>,
}

impl RelationshipFilter for AllOfFilter {
    fn accept(&self, rel: &Relationship, path: &Path, info: &PathInfo) -> Option<FilterRef> {
        let mut children = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            children.push(filter.accept(rel, path, info)?);
        }
        Some(Arc::new(AllOfFilter { filters: children }))
    }

    fn kinds(&self) -> KindSet {
        self.filters
            .iter()
            .fold(KindSet::ALL, |acc, f| acc.intersection(f.kinds()))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.filters.iter().map(|f| f.describe()).collect();
        format!("all_of({})", parts.join(","))
    }
}

#[derive(Debug, Clone)]
struct AnyOfFilter {
    filters: Vec<FilterRef>,
}

impl RelationshipFilter for AnyOfFilter {
    fn accept(&self, rel: &Relationship, path: &Path, info: &PathInfo) -> Option<FilterRef> {
        let children: Vec<FilterRef> = self
            .filters
            .iter()
            .filter_map(|filter| filter.accept(rel, path, info))
            .collect();
        if children.is_empty() {
            return None;
        }
        Some(Arc::new(AnyOfFilter { filters: children }))
    }

    fn kinds(&self) -> KindSet {
        self.filters
            .iter()
            .fold(KindSet::EMPTY, |acc, f| acc.union(f.kinds()))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.filters.iter().map(|f| f.describe()).collect();
        format!("any_of({})", parts.join(","))
    }
}

#[derive(Debug, Clone)]
struct NotFilter {
    inner: FilterRef,
}

impl RelationshipFilter for NotFilter {
    fn accept(&self, rel: &Relationship, path: &Path, info: &PathInfo) -> Option<FilterRef> {
        if self.inner.accept(rel, path, info).is_some() {
            None
        } else {
            Some(Arc::new(self.clone()))
        }
    }

    fn kinds(&self) -> KindSet {
        // The complement cannot be computed from the inner kind set alone.
        KindSet::ALL
    }

    fn describe(&self) -> String {
        format!("not({})", self.inner.describe())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::path::SelectorState;
    use crate::test_helpers::{dep, managed_dep, parent, test_dep};

    fn info(filter: &FilterRef) -> PathInfo {
        PathInfo::new("test", filter.clone(), SelectorState::default())
    }

    /// Accept-all admits everything and stays accept-all.
    #[test]
    fn test_accept_all() {
        let f = any();
        let ctx = info(&f);
        let rel = dep("g:a:1", "g:b:1", 0);
        assert!(f.accept(&rel, &Path::new(), &ctx).is_some());
        assert_eq!(f.kinds(), KindSet::ALL);
    }

    /// Kind filters admit only listed kinds.
    #[test]
    fn test_kind_filter() {
        let f = kinds(KindSet::of(&[RelationshipKind::Parent]));
        let ctx = info(&f);
        assert!(
            f.accept(&parent("g:a:1", "g:p:1"), &Path::new(), &ctx)
                .is_some()
        );
        assert!(
            f.accept(&dep("g:a:1", "g:b:1", 0), &Path::new(), &ctx)
                .is_none()
        );
    }

    /// The scope filter admits direct test-scope dependencies but narrows the
    /// child filter to transitive scopes.
    #[test]
    fn test_scope_filter_narrows() {
        let f = scopes(
            BTreeSet::from([DependencyScope::Compile, DependencyScope::Test]),
            false,
        );
        let ctx = info(&f);

        let direct_test = test_dep("g:a:1", "g:b:1", 0);
        let child = f
            .accept(&direct_test, &Path::new(), &ctx)
            .expect("direct test-scope dependency is admitted");

        // The same test-scope edge one hop further down is rejected.
        let child_ctx = PathInfo::new("test", child.clone(), SelectorState::default());
        let transitive_test = test_dep("g:b:1", "g:c:1", 0);
        assert!(
            child
                .accept(&transitive_test, &Path::new(), &child_ctx)
                .is_none()
        );

        // Compile keeps flowing.
        let transitive_compile = dep("g:b:1", "g:c:1", 0);
        assert!(
            child
                .accept(&transitive_compile, &Path::new(), &child_ctx)
                .is_some()
        );
    }

    /// Managed declarations require the include flag.
    #[test]
    fn test_scope_filter_managed() {
        let closed = scopes(BTreeSet::from([DependencyScope::Compile]), false);
        let open = scopes(BTreeSet::from([DependencyScope::Compile]), true);
        let rel = managed_dep("g:a:1", "g:b:1", 0);
        assert!(
            closed
                .accept(&rel, &Path::new(), &info(&closed))
                .is_none()
        );
        assert!(open.accept(&rel, &Path::new(), &info(&open)).is_some());
    }

    /// `all_of` intersects verdicts and kind sets.
    #[test]
    fn test_all_of() {
        let f = all_of(vec![
            kinds(KindSet::of(&[
                RelationshipKind::Dependency,
                RelationshipKind::Parent,
            ])),
            kinds(KindSet::of(&[RelationshipKind::Dependency])),
        ]);
        let ctx = info(&f);
        assert!(
            f.accept(&dep("g:a:1", "g:b:1", 0), &Path::new(), &ctx)
                .is_some()
        );
        assert!(
            f.accept(&parent("g:a:1", "g:p:1"), &Path::new(), &ctx)
                .is_none()
        );
        assert_eq!(f.kinds(), KindSet::of(&[RelationshipKind::Dependency]));
    }

    /// `any_of` unions verdicts and kind sets.
    #[test]
    fn test_any_of() {
        let f = any_of(vec![
            kinds(KindSet::of(&[RelationshipKind::Parent])),
            kinds(KindSet::of(&[RelationshipKind::Bom])),
        ]);
        let ctx = info(&f);
        assert!(
            f.accept(&parent("g:a:1", "g:p:1"), &Path::new(), &ctx)
                .is_some()
        );
        assert!(
            f.accept(&dep("g:a:1", "g:b:1", 0), &Path::new(), &ctx)
                .is_none()
        );
        assert_eq!(
            f.kinds(),
            KindSet::of(&[RelationshipKind::Parent, RelationshipKind::Bom])
        );
    }

    /// `not` inverts the verdict.
    #[test]
    fn test_not() {
        let f = not(kinds(KindSet::of(&[RelationshipKind::Dependency])));
        let ctx = info(&f);
        assert!(
            f.accept(&dep("g:a:1", "g:b:1", 0), &Path::new(), &ctx)
                .is_none()
        );
        assert!(
            f.accept(&parent("g:a:1", "g:p:1"), &Path::new(), &ctx)
                .is_some()
        );
    }

    /// Descriptors are stable strings suitable for hashing.
    #[test]
    fn test_describe() {
        assert_eq!(any().describe(), "any");
        assert_eq!(
            kinds(KindSet::of(&[RelationshipKind::Parent])).describe(),
            "kinds(parent)"
        );
        assert_eq!(
            all_of(vec![any(), none()]).describe(),
            "all_of(any,none)"
        );
        assert_eq!(not(none()).describe(), "not(none)");
    }
}
