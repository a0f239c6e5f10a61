//! Typed, directed relationships between project coordinates.
//!
//! A relationship is a kind tag plus a shared attribute record: declaring and
//! target coordinates, optional dependency scope, managed/concrete flags,
//! declaration index, the declaring POM location, and the set of source URIs
//! the relationship was observed in. All updates (`add_source`,
//! `select_declaring`, `select_target`) are pure constructors returning a new
//! value.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GraphError;
use crate::ident::ProjectRef;

// ---------------------------------------------------------------------------
// DependencyScope
// ---------------------------------------------------------------------------

/// Scope of a dependency relationship.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    /// Needed at compile time and propagated transitively.
    #[default]
    Compile,
    /// Provided by the runtime container; not propagated.
    Provided,
    /// Needed at run time only.
    Runtime,
    /// Needed for tests of the declaring project only.
    Test,
    /// Resolved from the local system; never propagated.
    System,
    /// A BOM import inside a management section.
    Import,
}

impl DependencyScope {
    /// Returns the `snake_case` string representation of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Provided => "provided",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::System => "system",
            Self::Import => "import",
        }
    }

    /// `true` for scopes that continue through transitive dependencies.
    pub fn is_transitive(self) -> bool {
        match self {
            Self::Compile | Self::Runtime => true,
            Self::Provided | Self::Test | Self::System | Self::Import => false,
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RelationshipKind
// ---------------------------------------------------------------------------

/// The kind of a typed relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// POM inheritance: declaring project to its parent.
    Parent,
    /// Bill-of-materials import.
    Bom,
    /// Build extension.
    Extension,
    /// Build plugin.
    Plugin,
    /// Dependency of a build plugin.
    PluginDependency,
    /// Direct or managed project dependency.
    Dependency,
}

impl RelationshipKind {
    /// Every kind, in expansion-priority order.
    pub const ALL: [RelationshipKind; 6] = [
        Self::Parent,
        Self::Bom,
        Self::Extension,
        Self::Plugin,
        Self::PluginDependency,
        Self::Dependency,
    ];

    /// Returns the `snake_case` string representation of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Bom => "bom",
            Self::Extension => "extension",
            Self::Plugin => "plugin",
            Self::PluginDependency => "plugin_dependency",
            Self::Dependency => "dependency",
        }
    }

    /// Expansion priority used for sorted traversal tie-breaks; lower is
    /// expanded first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Parent => 0,
            Self::Bom => 1,
            Self::Extension => 2,
            Self::Plugin => 3,
            Self::PluginDependency => 4,
            Self::Dependency => 5,
        }
    }

    fn bit(self) -> u8 {
        1 << self.priority()
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// KindSet
// ---------------------------------------------------------------------------

/// A small set of [`RelationshipKind`] values, used to narrow which edge
/// kinds a filter can accept and which edges the store iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u8);

impl KindSet {
    /// The empty set.
    pub const EMPTY: KindSet = KindSet(0);
    /// The set of all six kinds.
    pub const ALL: KindSet = KindSet(0b0011_1111);

    /// Builds a set from a slice of kinds.
    pub fn of(kinds: &[RelationshipKind]) -> Self {
        let mut set = Self::EMPTY;
        for &kind in kinds {
            set.insert(kind);
        }
        set
    }

    /// Adds a kind to the set.
    pub fn insert(&mut self, kind: RelationshipKind) {
        self.0 |= kind.bit();
    }

    /// Membership test.
    pub fn contains(self, kind: RelationshipKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Set union.
    pub fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }

    /// Set intersection.
    pub fn intersection(self, other: KindSet) -> KindSet {
        KindSet(self.0 & other.0)
    }

    /// `true` when no kind is present.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained kinds in priority order.
    pub fn iter(self) -> impl Iterator<Item = RelationshipKind> {
        RelationshipKind::ALL
            .into_iter()
            .filter(move |&k| self.contains(k))
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(RelationshipKind::as_str).collect();
        f.write_str(&names.join("|"))
    }
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// A typed, directed relationship between two coordinates.
///
/// Identity (for store interning) covers the kind, endpoints, scope, managed
/// flag, and declaration index; source URIs and the POM location are carried
/// metadata, so re-adding the same relationship unions its sources instead of
/// creating a second edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    kind: RelationshipKind,
    declaring: ProjectRef,
    target: ProjectRef,
    scope: Option<DependencyScope>,
    managed: bool,
    concrete: bool,
    index: u32,
    pom_location: Url,
    source_uris: BTreeSet<Url>,
}

impl Relationship {
    fn build(
        kind: RelationshipKind,
        declaring: ProjectRef,
        target: ProjectRef,
        scope: Option<DependencyScope>,
        managed: bool,
        concrete: bool,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        let source_uris: BTreeSet<Url> = sources.into_iter().collect();
        if source_uris.is_empty() {
            return Err(GraphError::InvalidArgument(
                "a relationship requires at least one source URI".to_owned(),
            ));
        }
        Ok(Self {
            kind,
            declaring,
            target,
            scope,
            managed,
            concrete,
            index,
            pom_location,
            source_uris,
        })
    }

    /// A direct or managed dependency.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn dependency(
        declaring: ProjectRef,
        target: ProjectRef,
        scope: DependencyScope,
        managed: bool,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        let concrete = !managed && !target.is_variable();
        Self::build(
            RelationshipKind::Dependency,
            declaring,
            target,
            Some(scope),
            managed,
            concrete,
            index,
            pom_location,
            sources,
        )
    }

    /// A parent (POM inheritance) relationship. Always concrete.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn parent(
        declaring: ProjectRef,
        target: ProjectRef,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        Self::build(
            RelationshipKind::Parent,
            declaring,
            target,
            None,
            false,
            true,
            index,
            pom_location,
            sources,
        )
    }

    /// A bill-of-materials import. Always concrete, never managed, even
    /// though a BOM is structurally declared inside a management section.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn bom(
        declaring: ProjectRef,
        target: ProjectRef,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        Self::build(
            RelationshipKind::Bom,
            declaring,
            target,
            None,
            false,
            true,
            index,
            pom_location,
            sources,
        )
    }

    /// A build plugin relationship.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn plugin(
        declaring: ProjectRef,
        target: ProjectRef,
        managed: bool,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        let concrete = !managed && !target.is_variable();
        Self::build(
            RelationshipKind::Plugin,
            declaring,
            target,
            None,
            managed,
            concrete,
            index,
            pom_location,
            sources,
        )
    }

    /// A dependency of a build plugin.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn plugin_dependency(
        declaring: ProjectRef,
        target: ProjectRef,
        managed: bool,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        let concrete = !managed && !target.is_variable();
        Self::build(
            RelationshipKind::PluginDependency,
            declaring,
            target,
            None,
            managed,
            concrete,
            index,
            pom_location,
            sources,
        )
    }

    /// A build extension relationship.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] when `sources` is empty.
    pub fn extension(
        declaring: ProjectRef,
        target: ProjectRef,
        index: u32,
        pom_location: Url,
        sources: impl IntoIterator<Item = Url>,
    ) -> Result<Self, GraphError> {
        let concrete = !target.is_variable();
        Self::build(
            RelationshipKind::Extension,
            declaring,
            target,
            None,
            false,
            concrete,
            index,
            pom_location,
            sources,
        )
    }

    /// The kind tag.
    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    /// The declaring coordinate.
    pub fn declaring(&self) -> &ProjectRef {
        &self.declaring
    }

    /// The target coordinate.
    pub fn target(&self) -> &ProjectRef {
        &self.target
    }

    /// The dependency scope, present on dependency relationships only.
    pub fn scope(&self) -> Option<DependencyScope> {
        self.scope
    }

    /// `true` when declared inside a management section.
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// `true` when the relationship is concrete (BOM and PARENT always are).
    pub fn is_concrete(&self) -> bool {
        self.concrete
    }

    /// Declaration order within the declaring POM.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Location of the declaring POM.
    pub fn pom_location(&self) -> &Url {
        &self.pom_location
    }

    /// The source URIs this relationship was observed in.
    pub fn source_uris(&self) -> &BTreeSet<Url> {
        &self.source_uris
    }

    /// The artifact actually resolved when crossing this edge: the target's
    /// POM artifact for BOM and PARENT edges, the target itself otherwise.
    pub fn target_artifact(&self) -> ProjectRef {
        match self.kind {
            RelationshipKind::Parent | RelationshipKind::Bom => self.target.pom_artifact(),
            RelationshipKind::Extension
            | RelationshipKind::Plugin
            | RelationshipKind::PluginDependency
            | RelationshipKind::Dependency => self.target.clone(),
        }
    }

    /// Returns a copy with `uri` added to the source set.
    pub fn add_source(mut self, uri: Url) -> Self {
        self.source_uris.insert(uri);
        self
    }

    /// Returns a copy with every URI in `uris` added to the source set.
    pub fn add_sources(mut self, uris: impl IntoIterator<Item = Url>) -> Self {
        self.source_uris.extend(uris);
        self
    }

    /// Replaces the source set wholesale. Used by driver transaction
    /// rollback, which must restore the exact pre-merge set.
    pub(crate) fn with_sources(mut self, sources: BTreeSet<Url>) -> Self {
        self.source_uris = sources;
        self
    }

    /// Returns a copy with the declaring coordinate replaced; all other
    /// attributes (kind, target, scope, flags, index, sources) are preserved.
    pub fn select_declaring(&self, declaring: ProjectRef) -> Self {
        Self {
            declaring,
            ..self.clone()
        }
    }

    /// Returns a copy with the target coordinate replaced. The concrete flag
    /// is recomputed for kinds where it derives from the target version.
    pub fn select_target(&self, target: ProjectRef) -> Self {
        let concrete = match self.kind {
            RelationshipKind::Parent | RelationshipKind::Bom => true,
            RelationshipKind::Extension => !target.is_variable(),
            RelationshipKind::Plugin
            | RelationshipKind::PluginDependency
            | RelationshipKind::Dependency => !self.managed && !target.is_variable(),
        };
        Self {
            target,
            concrete,
            ..self.clone()
        }
    }

    /// A PARENT relationship from a coordinate to itself marks the end of an
    /// inheritance chain; it is recorded as node state, not as an edge.
    pub fn is_terminus(&self) -> bool {
        self.kind == RelationshipKind::Parent && self.declaring == self.target
    }

    /// Renders the identity-relevant fields for store interning.
    pub fn identity_key(&self) -> String {
        let scope = self.scope.map_or("-", DependencyScope::as_str);
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.kind, self.declaring, self.target, scope, self.managed, self.index
        )
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.declaring, self.kind, self.target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
