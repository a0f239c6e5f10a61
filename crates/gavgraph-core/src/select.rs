//! Version-selection policies applied during traversal.
//!
//! A selector inspects each candidate edge together with the path that led to
//! it and either keeps the edge, substitutes a different one (which the
//! engine interns as a *selection edge*), or rejects the branch. Selector
//! state travels inside [`PathInfo`](crate::path::PathInfo), so decisions may
//! depend on earlier choices along the same path — first-win version pinning
//! is the provided stateful policy.

use std::fmt;
use std::sync::Arc;

use crate::path::{Path, SelectorState};
use crate::rel::Relationship;

/// Outcome of a selection decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Continue through the original edge.
    Keep,
    /// Continue through the substitute; the engine interns it as a selection
    /// edge (or reuses a pre-existing edge with the same identity).
    Substitute(Relationship),
    /// Reject this branch.
    Reject,
}

/// Shared handle to a selector.
pub type SelectorRef = Arc<dyn RelationshipSelector>;

/// Version-selection policy attached to a view.
pub trait RelationshipSelector: fmt::Debug + Send + Sync {
    /// Decides what to do with a candidate edge.
    fn select(&self, rel: &Relationship, path: &Path, state: &SelectorState) -> Selection;

    /// Derives the selector state that applies beyond the effective edge.
    /// The default carries the state through unchanged.
    fn next_state(&self, effective: &Relationship, state: &SelectorState) -> SelectorState {
        let _ = effective;
        state.clone()
    }

    /// A stable descriptor string, persisted on the view and hashed into the
    /// view short-id.
    fn describe(&self) -> String;
}

/// A selector that keeps every edge unchanged.
pub fn noop() -> SelectorRef {
    Arc::new(NoopSelector)
}

/// A selector that pins each `group:artifact` pair to the first version
/// encountered along a path and prunes later conflicting versions (the
/// dependency is already satisfied upstream on that path).
pub fn first_win() -> SelectorRef {
    Arc::new(FirstWinSelector)
}

#[derive(Debug, Clone, Copy, Default)]
struct NoopSelector;

impl RelationshipSelector for NoopSelector {
    fn select(&self, _rel: &Relationship, _path: &Path, _state: &SelectorState) -> Selection {
        Selection::Keep
    }

    fn describe(&self) -> String {
        "noop".to_owned()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FirstWinSelector;

impl RelationshipSelector for FirstWinSelector {
    fn select(&self, rel: &Relationship, _path: &Path, state: &SelectorState) -> Selection {
        let ga = rel.target().ga();
        if let Some(pinned) = state.pin_for(&ga) {
            if pinned != rel.target().version() {
                // The pinned version sits upstream on this very path, so a
                // substitute edge would close a loop; prune the branch.
                return Selection::Reject;
            }
        }
        Selection::Keep
    }

    fn next_state(&self, effective: &Relationship, state: &SelectorState) -> SelectorState {
        let ga = effective.target().ga();
        if state.pin_for(&ga).is_none() {
            state.with_pin(ga, effective.target().version().clone())
        } else {
            state.clone()
        }
    }

    fn describe(&self) -> String {
        "first_win".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_helpers::dep;

    /// The no-op selector keeps everything and leaves state untouched.
    #[test]
    fn test_noop_keeps() {
        let selector = noop();
        let rel = dep("g:a:1", "g:b:1", 0);
        let state = SelectorState::default();
        assert_eq!(selector.select(&rel, &Path::new(), &state), Selection::Keep);
        assert!(selector.next_state(&rel, &state).is_empty());
    }

    /// First-win pins the first version and prunes later conflicts.
    #[test]
    fn test_first_win_pins_and_prunes() {
        let selector = first_win();
        let first = dep("g:a:1", "g:lib:1.0", 0);
        let state = SelectorState::default();

        assert_eq!(
            selector.select(&first, &Path::new(), &state),
            Selection::Keep
        );
        let pinned = selector.next_state(&first, &state);

        let conflicting = dep("g:mid:1", "g:lib:2.0", 0);
        assert_eq!(
            selector.select(&conflicting, &Path::new(), &pinned),
            Selection::Reject
        );
    }

    /// A matching version is kept, and the existing pin is not overwritten.
    #[test]
    fn test_first_win_keeps_matching_version() {
        let selector = first_win();
        let first = dep("g:a:1", "g:lib:1.0", 0);
        let pinned = selector.next_state(&first, &SelectorState::default());

        let matching = dep("g:mid:1", "g:lib:1.0", 0);
        assert_eq!(
            selector.select(&matching, &Path::new(), &pinned),
            Selection::Keep
        );
        let after = selector.next_state(&matching, &pinned);
        assert_eq!(
            after.pin_for(&matching.target().ga()),
            Some(matching.target().version())
        );
    }
}
