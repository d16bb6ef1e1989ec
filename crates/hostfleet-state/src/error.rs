//! Error types for hostfleet node snapshots.

use thiserror::Error;

/// Result type alias for snapshot operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while loading or querying a node snapshot.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("duplicate hostname in snapshot: {0}")]
    DuplicateHostname(String),

    #[error("node {child} has parent {parent} which is not in the snapshot")]
    MissingParent { child: String, parent: String },

    #[error("node {child} has parent {parent} which is not a host")]
    ParentNotHost { child: String, parent: String },

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
