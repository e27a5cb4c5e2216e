//! Prelude module for convenient imports.
//!
//! Re-exports the most commonly used types for building and driving a
//! cluster supervisor. Import this module to get started quickly:
//!
//! ```rust
//! use nanny_core::prelude::*;
//! ```
//!
//! # What's Included
//!
//! ## Fleet Coordination
//! - [`ClusterSupervisor`] - owns worker slots and load balancers
//! - [`NannyConfig`] / [`NannyConfigBuilder`] - fleet configuration
//! - [`ClusterState`] - top-level lifecycle state
//! - [`ClusterSupervisorState`] / [`WorkerSnapshot`] - inspection snapshot
//! - [`ClusterError`] - cluster-level error
//!
//! ## Load Balancing
//! - [`LoadBalancer`] - one listening address, round-robin dispatch
//! - [`BalancerState`] - balancer lifecycle state
//! - [`RequestedAddress`] - (address, port, accept-backlog) identity
//! - [`BalancerSnapshot`] - balancer inspection snapshot
//!
//! ## Worker Capability
//! - [`WorkerSupervisor`] - capability implemented by the worker collaborator
//! - [`WorkerState`] / [`WorkerSlot`] - per-slot lifecycle state
//! - [`ListenError`] - opaque listener failure
//!
//! ## Health
//! - [`HealthReport`] / [`MemoryUsage`] - a worker's self-reported health
//! - [`HealthPolicy`] / [`AlwaysHealthy`] - the health predicate
//!
//! ## Supporting Types
//! - [`LogicalId`] / [`ListenAddress`] - identifiers
//! - [`Clock`] / [`SystemClock`] / [`TestClock`] - time source
//! - [`Logger`] / [`TracingLogger`] / [`NoopLogger`] - structured logging
//! - [`BacklogDropPolicy`] - drop policy once a backlog is full

// Fleet coordination
pub use crate::cluster::{
    ClusterError, ClusterState, ClusterSupervisor, ClusterSupervisorState, ConfigError,
    NannyConfig, NannyConfigBuilder, WorkerSnapshot,
};

// Load balancing
pub use crate::balancer::{BalancerSnapshot, BalancerState, LoadBalancer, RequestedAddress};

// Worker capability
pub use crate::worker::{ListenError, WorkerError, WorkerSlot, WorkerState, WorkerSupervisor};

// Health
pub use crate::health::{AlwaysHealthy, HealthPolicy, HealthReport, MemoryUsage};

// Supporting types
pub use crate::backlog::BacklogDropPolicy;
pub use crate::clock::{Clock, SystemClock, TestClock};
pub use crate::ids::{ListenAddress, LogicalId};
pub use crate::logger::{Logger, NoopLogger, TracingLogger};
