//! Errors raised by worker-slot lifecycle operations.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::ids::LogicalId;
use super::state::WorkerState;

/// Errors raised by [`super::state::WorkerSlot`] transitions and by
/// [`crate::cluster::ClusterSupervisor`] slot lookups.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No slot is registered under this id.
    #[error("unknown worker slot: {id}")]
    NotFound { id: LogicalId },

    /// The requested transition is not reachable from the current state.
    #[error("worker '{id}' cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        id: LogicalId,
        from: WorkerState,
        to: WorkerState,
    },

    /// The slot is administratively disabled and cannot be (re)started.
    #[error("worker '{id}' is administratively disabled")]
    AlreadyDisabled { id: LogicalId },
}

impl WorkerError {
    /// The slot id this error is about, if any.
    pub fn logical_id(&self) -> &LogicalId {
        match self {
            WorkerError::NotFound { id }
            | WorkerError::InvalidTransition { id, .. }
            | WorkerError::AlreadyDisabled { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_id() {
        let err = WorkerError::NotFound {
            id: LogicalId::from_index(1),
        };
        assert_eq!(*err.logical_id(), LogicalId::from_index(1));
        assert!(err.to_string().contains('1'));
    }
}
