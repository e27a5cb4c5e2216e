//! Errors raised by [`super::ClusterSupervisor`] and [`super::config::NannyConfig`].

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::ids::LogicalId;
use crate::worker::WorkerError;

/// Errors from building a [`super::config::NannyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `worker_count` nor `logical_ids` produced any slots.
    #[error("nanny config must specify a positive worker_count or a non-empty logical_ids list")]
    InvalidWorkerCount,

    /// Documents the resolved `workerCount`/`logicalIds` precedence from
    /// `spec.md` §4.4 ("if both given, logicalIds wins"); the builder
    /// always resolves rather than rejecting, so this variant is never
    /// actually constructed.
    #[error("worker_count and logical_ids were both set; logical_ids takes precedence")]
    ConflictingWorkerSpec,

    /// `worker_path` was never set.
    #[error("nanny config requires worker_path")]
    MissingWorkerPath,

    /// `pulse` was zero.
    #[error("nanny config pulse interval must be > 0")]
    InvalidPulse,
}

/// Errors from [`super::ClusterSupervisor`] operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// No load balancer is registered for the given port.
    #[error("unknown load balancer for port {port}")]
    UnknownBalancer { port: u16 },

    /// Configuration failed validation.
    #[error("invalid nanny configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker-slot operation failed.
    #[error("worker operation failed: {0}")]
    Worker(#[from] WorkerError),
}

impl ClusterError {
    /// The slot this error concerns, if any.
    pub fn logical_id(&self) -> Option<&LogicalId> {
        match self {
            ClusterError::Worker(err) => Some(err.logical_id()),
            ClusterError::UnknownBalancer { .. } | ClusterError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_balancer_display() {
        let err = ClusterError::UnknownBalancer { port: 9000 };
        assert!(err.to_string().contains("9000"));
        assert!(err.logical_id().is_none());
    }

    #[test]
    fn worker_error_conversion_carries_id() {
        let err: ClusterError = WorkerError::NotFound {
            id: LogicalId::from_index(2),
        }
        .into();
        assert_eq!(*err.logical_id().unwrap(), LogicalId::from_index(2));
    }
}
