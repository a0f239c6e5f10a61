//! Shared test helper functions for constructing test fixtures.
//!
//! This module is compiled only in test builds and provides common
//! constructors for coordinates and relationships used across unit test
//! modules throughout `gavgraph-core`.
//!
//! Integration tests in `crates/gavgraph-core/tests/` define their own local
//! helpers because they link against the non-test library build where this
//! module is not available.
#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use url::Url;

use crate::ident::{GroupArtifact, ProjectRef};
use crate::rel::{DependencyScope, Relationship};

/// Parses a canonical coordinate string, panicking on invalid input.
pub fn pref(s: &str) -> ProjectRef {
    ProjectRef::try_from(s).expect("valid coordinate")
}

/// Parses a `group:artifact` string, panicking on invalid input.
pub fn ga(s: &str) -> GroupArtifact {
    GroupArtifact::try_from(s).expect("valid group:artifact pair")
}

/// Parses a URL, panicking on invalid input.
pub fn loc(s: &str) -> Url {
    Url::parse(s).expect("valid url")
}

/// The default one-element source set used by fixture relationships.
pub fn sources() -> BTreeSet<Url> {
    BTreeSet::from([loc("http://repo.example/releases")])
}

/// A compile-scope, unmanaged dependency between two coordinate strings.
pub fn dep(declaring: &str, target: &str, index: u32) -> Relationship {
    Relationship::dependency(
        pref(declaring),
        pref(target),
        DependencyScope::Compile,
        false,
        index,
        loc("http://repo.example/fixture.pom"),
        sources(),
    )
    .expect("valid relationship")
}

/// A compile-scope, managed dependency between two coordinate strings.
pub fn managed_dep(declaring: &str, target: &str, index: u32) -> Relationship {
    Relationship::dependency(
        pref(declaring),
        pref(target),
        DependencyScope::Compile,
        true,
        index,
        loc("http://repo.example/fixture.pom"),
        sources(),
    )
    .expect("valid relationship")
}

/// A test-scope, unmanaged dependency between two coordinate strings.
pub fn test_dep(declaring: &str, target: &str, index: u32) -> Relationship {
    Relationship::dependency(
        pref(declaring),
        pref(target),
        DependencyScope::Test,
        false,
        index,
        loc("http://repo.example/fixture.pom"),
        sources(),
    )
    .expect("valid relationship")
}

/// A parent relationship between two coordinate strings.
pub fn parent(declaring: &str, target: &str) -> Relationship {
    Relationship::parent(
        pref(declaring),
        pref(target),
        0,
        loc("http://repo.example/fixture.pom"),
        sources(),
    )
    .expect("valid relationship")
}

/// A parent terminus marker: the coordinate was parsed and declares nothing.
pub fn terminus(project: &str) -> Relationship {
    let p = pref(project);
    Relationship::parent(
        p.clone(),
        p,
        0,
        loc("http://repo.example/fixture.pom"),
        sources(),
    )
    .expect("valid relationship")
}
