//! Central error type for the relationship-graph engine.
//!
//! Every fallible engine and driver operation returns [`Result`]. Coordinate
//! construction has its own [`IdentError`](crate::ident::IdentError), which is
//! converted at the engine boundary.

use thiserror::Error;

use crate::ident::IdentError;
use crate::store::{EdgeId, NodeId};

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced by the engine and by store drivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The store has been shut down; no further operations are possible.
    #[error("store is closed")]
    StoreClosed,
    /// A caller-supplied argument was malformed or referenced unknown state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A coordinate was rejected during node creation.
    ///
    /// Within a batch ingest the offending relationship is dropped and its
    /// siblings still commit; see the recovery policy on
    /// [`RelationshipGraph::add_relationships`](crate::graph::RelationshipGraph::add_relationships).
    #[error("invalid version for {project}: {reason}")]
    InvalidVersion { project: String, reason: String },
    /// A synthesized selection edge would close a loop in the view.
    #[error("selecting {project} for view {view} would introduce a cycle")]
    SelectionConflict { view: String, project: String },
    /// A node identifier did not resolve in the store.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// An edge identifier did not resolve in the store.
    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),
    /// An unexpected failure inside the store driver.
    #[error("driver failure: {0}")]
    Driver(String),
}

impl From<IdentError> for GraphError {
    fn from(err: IdentError) -> Self {
        match err {
            IdentError::InvalidVersion { version, reason } => GraphError::InvalidVersion {
                project: version,
                reason: reason.to_owned(),
            },
            IdentError::InvalidGroupId(_)
            | IdentError::InvalidArtifactId(_)
            | IdentError::InvalidClassifier(_)
            | IdentError::InvalidExtension(_)
            | IdentError::MalformedCoordinate(_) => GraphError::InvalidArgument(err.to_string()),
        }
    }
}
