//! Allocation error types.

use hostfleet_state::NodeState;
use thiserror::Error;

/// Errors that abort an allocation attempt.
///
/// Shortfall is not an error: it is reported on
/// [`Allocation`](crate::allocator::Allocation).
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Two candidates tied on every state stage but have different states.
    /// The state partition in the comparator is incomplete.
    #[error(
        "node priority comparison found unequal states {left} ({left_host}) and {right} ({right_host})"
    )]
    StateMismatch {
        left_host: String,
        left: NodeState,
        right_host: String,
        right: NodeState,
    },

    #[error("candidate {node} references unknown parent host {parent}")]
    UnknownParent { node: String, parent: String },

    #[error("state error: {0}")]
    State(#[from] hostfleet_state::StateError),
}

pub type AllocationResult<T> = Result<T, AllocationError>;
