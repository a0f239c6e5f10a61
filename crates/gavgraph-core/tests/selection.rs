//! Ad-hoc version selection: substitution, per-view isolation, conflicts.
#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use url::Url;

use gavgraph_core::{
    DependencyScope, GraphError, GroupArtifact, KindSet, ProjectRef, Relationship,
    RelationshipGraph, VersionSpec, ViewParams, filter, select,
};

fn pref(s: &str) -> ProjectRef {
    ProjectRef::try_from(s).expect("valid coordinate")
}

fn ga(s: &str) -> GroupArtifact {
    GroupArtifact::try_from(s).expect("valid group:artifact pair")
}

fn version(s: &str) -> VersionSpec {
    VersionSpec::parse(s).expect("valid version")
}

fn sources() -> BTreeSet<Url> {
    BTreeSet::from([Url::parse("http://repo.example/releases").expect("valid url")])
}

fn pom() -> Url {
    Url::parse("http://repo.example/fixture.pom").expect("valid url")
}

fn dep(declaring: &str, target: &str, managed: bool, index: u32) -> Relationship {
    Relationship::dependency(
        pref(declaring),
        pref(target),
        DependencyScope::Compile,
        managed,
        index,
        pom(),
        sources(),
    )
    .expect("valid relationship")
}

fn accept_all_view(roots: &[&str]) -> ViewParams {
    ViewParams::new(
        roots.iter().map(|r| pref(r)).collect(),
        filter::any(),
        select::noop(),
    )
}

/// An equivalent accept-everything view with a distinct configuration, so it
/// registers under its own short id.
fn second_view(roots: &[&str]) -> ViewParams {
    ViewParams::new(
        roots.iter().map(|r| pref(r)).collect(),
        filter::kinds(KindSet::ALL),
        select::noop(),
    )
}

/// Scenario: two versions of the same GA under one declarer; registering a
/// selection reroutes every cached path onto the chosen version.
#[test]
fn selection_pins_all_paths_to_chosen_version() {
    let graph = RelationshipGraph::in_memory();
    graph
        .add_relationships(&[
            dep("g:a:1", "g:b:1.0", false, 0),
            dep("g:a:1", "g:b:2.0", true, 0),
        ])
        .expect("adds");
    let view = graph
        .register_view(accept_all_view(&["g:a:1"]))
        .expect("registers");

    // Before selection both versions are reachable.
    assert_eq!(
        graph.all_paths_to(&view, &pref("g:b:1.0")).expect("queries").len(),
        1
    );
    assert_eq!(
        graph.all_paths_to(&view, &pref("g:b:2.0")).expect("queries").len(),
        1
    );

    graph
        .register_view_selection(&view, ga("g:b"), version("2.0"))
        .expect("selects");

    let to_chosen = graph.all_paths_to(&view, &pref("g:b:2.0")).expect("queries");
    assert_eq!(to_chosen.len(), 2, "substituted path plus the managed edge");
    for path in &to_chosen {
        assert_eq!(
            path.last().expect("non-empty path").target(),
            &pref("g:b:2.0")
        );
    }
    assert!(
        graph
            .all_paths_to(&view, &pref("g:b:1.0"))
            .expect("queries")
            .is_empty(),
        "no cached path ends at the unchosen version"
    );
}

/// Selection edges are invisible to views that did not choose them.
#[test]
fn selection_edges_do_not_leak_across_views() {
    let graph = RelationshipGraph::in_memory();
    graph
        .add_relationships(&[
            dep("g:a:1", "g:b:1.0", false, 0),
            dep("g:a:1", "g:b:2.0", true, 0),
        ])
        .expect("adds");
    let selecting = graph
        .register_view(accept_all_view(&["g:a:1"]))
        .expect("registers");
    graph
        .register_view_selection(&selecting, ga("g:b"), version("2.0"))
        .expect("selects");

    // A second view registered after the selection edge exists in the store.
    let other = graph
        .register_view(second_view(&["g:a:1"]))
        .expect("registers");
    assert_eq!(
        graph
            .all_paths_to(&other, &pref("g:b:1.0"))
            .expect("queries")
            .len(),
        1,
        "the original edge is still followed"
    );
    assert_eq!(
        graph.all_relationships(&other).expect("queries").len(),
        2,
        "the synthesized selection edge is not followed on its own merit"
    );
}

/// A selection whose substitute lands on an ancestor is refused and rolled
/// back; the view keeps answering without it.
#[test]
fn conflicting_selection_is_rejected() {
    let graph = RelationshipGraph::in_memory();
    graph
        .add_relationships(&[
            dep("g:a:1", "g:b:1", false, 0),
            dep("g:b:1", "g:a:2", false, 0),
        ])
        .expect("adds");
    let view = graph
        .register_view(accept_all_view(&["g:a:1"]))
        .expect("registers");

    let err = graph
        .register_view_selection(&view, ga("g:a"), version("1"))
        .expect_err("substituting g:a:2 -> g:a:1 closes a loop");
    assert!(matches!(err, GraphError::SelectionConflict { .. }));

    // The rolled-back view still materializes and sees the original edges.
    let projects = graph.all_projects(&view).expect("queries");
    assert!(projects.contains(&pref("g:a:2")));
}

/// The first-win selector prunes a conflicting version further down the same
/// path; an unrelated sibling path is unaffected.
#[test]
fn first_win_selector_prunes_downstream_conflicts() {
    let graph = RelationshipGraph::in_memory();
    graph
        .add_relationships(&[
            dep("g:a:1", "g:lib:1.0", false, 0),
            dep("g:lib:1.0", "g:util:1", false, 0),
            dep("g:util:1", "g:lib:2.0", false, 0),
            dep("g:a:1", "g:other:1", false, 1),
        ])
        .expect("adds");
    let view = graph
        .register_view(ViewParams::new(
            vec![pref("g:a:1")],
            filter::any(),
            select::first_win(),
        ))
        .expect("registers");

    let projects = graph.all_projects(&view).expect("queries");
    assert!(projects.contains(&pref("g:lib:1.0")));
    assert!(projects.contains(&pref("g:other:1")));
    assert!(
        !projects.contains(&pref("g:lib:2.0")),
        "conflicting downstream version pruned by the pin"
    );
}

/// Closing the engine after selections succeeds (selection edges are
/// session-scoped and dropped on shutdown).
#[test]
fn close_discards_selections() {
    let graph = RelationshipGraph::in_memory();
    graph
        .add_relationships(&[
            dep("g:a:1", "g:b:1.0", false, 0),
            dep("g:a:1", "g:b:2.0", true, 0),
        ])
        .expect("adds");
    let view = graph
        .register_view(accept_all_view(&["g:a:1"]))
        .expect("registers");
    graph
        .register_view_selection(&view, ga("g:b"), version("2.0"))
        .expect("selects");
    graph.close().expect("closes");
    assert!(matches!(
        graph.all_projects(&view),
        Err(GraphError::StoreClosed)
    ));
}
