//! Persistent edge-identifier paths and per-path traversal state.
//!
//! A [`Path`] is the ordered sequence of edge identifiers from a root to the
//! current node, stored as a chain of `Arc` links so `append` is O(1) and
//! clones are cheap. Two paths are equal iff their sequences are equal; the
//! empty path denotes a root. [`PathInfo`] carries the filter and selector
//! state accumulated along a path, and [`SelectorState`] is the immutable
//! copy-on-write pin map selectors thread through it.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::filter::{FilterRef, RelationshipFilter};
use crate::ident::{GroupArtifact, VersionSpec};
use crate::rel::Relationship;
use crate::store::EdgeId;

// ---------------------------------------------------------------------------
// Path
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Link {
    rid: EdgeId,
    prev: Option<Arc<Link>>,
}

/// An ordered sequence of edge identifiers from a root (possibly empty).
#[derive(Clone, Default)]
pub struct Path {
    head: Option<Arc<Link>>,
    len: usize,
}

impl Path {
    /// The empty path (a root).
    pub fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Builds a path from a root-to-tip identifier sequence.
    pub fn from_rids(rids: &[EdgeId]) -> Self {
        rids.iter().fold(Self::new(), |path, &rid| path.append(rid))
    }

    /// Returns a new path with `rid` appended. O(1); `self` is unchanged.
    pub fn append(&self, rid: EdgeId) -> Self {
        Self {
            head: Some(Arc::new(Link {
                rid,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Number of edges in the path.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` for the empty (root) path.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The last edge identifier, or `None` for the empty path.
    pub fn last_rid(&self) -> Option<EdgeId> {
        self.head.as_ref().map(|link| link.rid)
    }

    /// The edge identifiers in root-to-tip order.
    pub fn rids(&self) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = self.iter_rev().collect();
        out.reverse();
        out
    }

    /// `true` when the path crosses `rid`.
    pub fn contains_rid(&self, rid: EdgeId) -> bool {
        self.iter_rev().any(|r| r == rid)
    }

    /// Deterministic serialization of the identifier sequence, usable as a
    /// cache key. The empty path renders as `[]`.
    pub fn key(&self) -> String {
        let parts: Vec<String> = self.rids().iter().map(EdgeId::to_string).collect();
        format!("[{}]", parts.join(","))
    }

    /// Iterates edge identifiers tip-to-root (the cheap direction).
    fn iter_rev(&self) -> RevIter<'_> {
        RevIter {
            cursor: self.head.as_deref(),
        }
    }
}

struct RevIter<'a> {
    cursor: Option<&'a Link>,
}

impl Iterator for RevIter<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<EdgeId> {
        let link = self.cursor?;
        self.cursor = link.prev.as_deref();
        Some(link.rid)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter_rev().eq(other.iter_rev())
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);
        for rid in self.iter_rev() {
            rid.hash(state);
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ---------------------------------------------------------------------------
// SelectorState
// ---------------------------------------------------------------------------

/// Immutable per-path selector state: versions pinned by earlier choices on
/// the same path.
///
/// Updates are copy-on-write behind an `Arc`, so sibling branches never
/// observe each other's pins.
#[derive(Debug, Clone, Default)]
pub struct SelectorState {
    pins: Arc<BTreeMap<GroupArtifact, VersionSpec>>,
}

impl SelectorState {
    /// The version pinned for `ga` on this path, if any.
    pub fn pin_for(&self, ga: &GroupArtifact) -> Option<&VersionSpec> {
        self.pins.get(ga)
    }

    /// Returns a new state with `ga` pinned to `version`.
    pub fn with_pin(&self, ga: GroupArtifact, version: VersionSpec) -> Self {
        let mut pins = (*self.pins).clone();
        pins.insert(ga, version);
        Self {
            pins: Arc::new(pins),
        }
    }

    /// `true` when no version has been pinned yet.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PathInfo
// ---------------------------------------------------------------------------

/// The filter and selector state in force at the tip of a path.
///
/// The view constructs the initial info from its root filter; every accepted
/// edge derives the next info via [`PathInfo::child`], so the filter narrows
/// as traversal descends.
#[derive(Debug, Clone)]
pub struct PathInfo {
    view_id: Arc<str>,
    filter: FilterRef,
    state: SelectorState,
}

impl PathInfo {
    /// Builds the initial info for a view root.
    pub fn new(view_id: &str, filter: FilterRef, state: SelectorState) -> Self {
        Self {
            view_id: Arc::from(view_id),
            filter,
            state,
        }
    }

    /// The short identifier of the owning view.
    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    /// The filter in force at this point of the path.
    pub fn filter(&self) -> &FilterRef {
        &self.filter
    }

    /// The selector state in force at this point of the path.
    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    /// Derives the info that applies beyond `rel`, consulting the current
    /// filter. Returns `None` to abort the branch.
    pub fn child(
        &self,
        rel: &Relationship,
        path: &Path,
        next_state: SelectorState,
    ) -> Option<PathInfo> {
        let child_filter = self.filter.accept(rel, path, self)?;
        Some(PathInfo {
            view_id: self.view_id.clone(),
            filter: child_filter,
            state: next_state,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::filter;
    use crate::test_helpers::dep;

    fn rid(n: u32) -> EdgeId {
        EdgeId(n)
    }

    /// Appending yields the original sequence back from `rids`.
    #[test]
    fn test_append_round_trip() {
        let path = Path::new().append(rid(3)).append(rid(1)).append(rid(7));
        assert_eq!(path.rids(), vec![rid(3), rid(1), rid(7)]);
        assert_eq!(path.len(), 3);
        assert_eq!(path.last_rid(), Some(rid(7)));
        assert!(!path.is_empty());
    }

    /// `from_rids` and incremental appends build equal paths.
    #[test]
    fn test_from_rids_equivalence() {
        let a = Path::from_rids(&[rid(1), rid(2), rid(3)]);
        let b = Path::new().append(rid(1)).append(rid(2)).append(rid(3));
        assert_eq!(a, b);
    }

    /// Appending leaves the parent path untouched (persistence).
    #[test]
    fn test_append_is_persistent() {
        let parent = Path::new().append(rid(1));
        let child = parent.append(rid(2));
        assert_eq!(parent.rids(), vec![rid(1)]);
        assert_eq!(child.rids(), vec![rid(1), rid(2)]);
        assert_ne!(parent, child);
    }

    /// Structural equality distinguishes order and length.
    #[test]
    fn test_structural_equality() {
        assert_eq!(Path::new(), Path::new());
        assert_ne!(
            Path::from_rids(&[rid(1), rid(2)]),
            Path::from_rids(&[rid(2), rid(1)])
        );
        assert_ne!(Path::from_rids(&[rid(1)]), Path::new());
    }

    /// Keys are deterministic and distinct for distinct sequences.
    #[test]
    fn test_key_determinism() {
        assert_eq!(Path::new().key(), "[]");
        let path = Path::from_rids(&[rid(1), rid(2)]);
        assert_eq!(path.key(), "[e1,e2]");
        assert_ne!(path.key(), Path::from_rids(&[rid(2), rid(1)]).key());
    }

    /// Membership scans the whole sequence.
    #[test]
    fn test_contains_rid() {
        let path = Path::from_rids(&[rid(1), rid(2)]);
        assert!(path.contains_rid(rid(1)));
        assert!(!path.contains_rid(rid(9)));
    }

    /// Pins are copy-on-write: a child pin is invisible to the parent state.
    #[test]
    fn test_selector_state_copy_on_write() {
        let rel = dep("g:a:1", "g:b:2", 0);
        let base = SelectorState::default();
        let pinned = base.with_pin(rel.target().ga(), rel.target().version().clone());
        assert!(base.pin_for(&rel.target().ga()).is_none());
        assert_eq!(
            pinned.pin_for(&rel.target().ga()),
            Some(rel.target().version())
        );
    }

    use proptest::prelude::*;

    proptest! {
        /// Building a path from any identifier sequence iterates back to the
        /// same sequence.
        #[test]
        fn prop_round_trip(ids in proptest::collection::vec(0u32..1000, 0..32)) {
            let rids: Vec<EdgeId> = ids.iter().map(|&n| EdgeId(n)).collect();
            let path = Path::from_rids(&rids);
            prop_assert_eq!(path.rids(), rids);
            prop_assert_eq!(path.len(), ids.len());
        }

        /// Keys and equality agree, and distinct sequences stay distinct.
        #[test]
        fn prop_key_matches_equality(
            a in proptest::collection::vec(0u32..50, 0..12),
            b in proptest::collection::vec(0u32..50, 0..12),
        ) {
            let pa = Path::from_rids(&a.iter().map(|&n| EdgeId(n)).collect::<Vec<_>>());
            let pb = Path::from_rids(&b.iter().map(|&n| EdgeId(n)).collect::<Vec<_>>());
            if a == b {
                prop_assert_eq!(&pa, &pb);
                prop_assert_eq!(pa.key(), pb.key());
            } else {
                prop_assert_ne!(&pa, &pb);
                prop_assert_ne!(pa.key(), pb.key());
            }
        }
    }

    /// `child` threads the view id and applies the filter.
    #[test]
    fn test_path_info_child() {
        let rel = dep("g:a:1", "g:b:1", 0);
        let info = PathInfo::new("abc123", filter::any(), SelectorState::default());
        let child = info
            .child(&rel, &Path::new(), SelectorState::default())
            .expect("accept-all admits everything");
        assert_eq!(child.view_id(), "abc123");

        let rejecting = PathInfo::new("abc123", filter::none(), SelectorState::default());
        assert!(
            rejecting
                .child(&rel, &Path::new(), SelectorState::default())
                .is_none()
        );
    }
}
