#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod cache;
pub mod cycles;
pub mod error;
pub mod filter;
pub mod graph;
pub mod ident;
pub mod path;
pub mod rel;
pub mod select;
pub mod store;
pub mod traverse;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{CachedPath, PathKey, ViewCache};
pub use cycles::Cycle;
pub use error::{GraphError, Result};
pub use filter::{FilterRef, RelationshipFilter};
pub use graph::RelationshipGraph;
pub use ident::{GroupArtifact, IdentError, ProjectRef, VersionSpec};
pub use path::{Path, PathInfo, SelectorState};
pub use rel::{DependencyScope, KindSet, Relationship, RelationshipKind};
pub use select::{RelationshipSelector, Selection, SelectorRef};
pub use store::{EdgeFlag, EdgeId, GraphDriver, InternedEdge, MemoryDriver, NodeId};
pub use traverse::{TraversalOptions, TraversalOrder, TraversalSpec, TraversalVisitor, Uniqueness};
pub use view::ViewParams;

/// Returns the current version of the gavgraph-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
