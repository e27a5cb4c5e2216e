//! # nanny-core - Process-Level Cluster Supervisor
//!
//! A fixed fleet of worker processes, each dispatched to through a
//! round-robin load balancer bound to one listening address, supervised by
//! a single `ClusterSupervisor` that restarts, health-checks, and drains
//! them.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nanny_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NannyConfig::builder("/usr/bin/worker")
//!         .with_worker_count(4)
//!         .with_pulse(std::time::Duration::from_secs(5))
//!         .build()
//!         .expect("valid nanny configuration");
//!
//!     let logger = Arc::new(TracingLogger);
//!     let cluster = ClusterSupervisor::new(
//!         config,
//!         |id| Arc::new(MyWorkerHandle::spawn(id.clone())),
//!         logger,
//!     );
//!
//!     cluster.start();
//!     // ... run until shutdown signal ...
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     cluster.stop(Some(Box::new(move || { let _ = tx.send(()); })));
//!     rx.await.ok();
//! }
//! ```
//!
//! # Core Features
//!
//! ## Generic Constraints Over `dyn`
//! - `LoadBalancer<W: WorkerSupervisor>` and `ClusterSupervisor<W>` are
//!   generic over the worker capability rather than boxing it — the fleet
//!   is homogeneous, so monomorphization costs nothing and keeps dispatch
//!   on the hot path allocation-free.
//! - `dyn` is still used at the edges where heterogeneity is the point:
//!   `Arc<dyn Logger>`, `Arc<dyn Clock>`, `Arc<dyn HealthPolicy>`,
//!   `Arc<dyn EnvironmentFactory>`, `Arc<dyn RestartPolicy>` are all
//!   pluggable collaborators, not part of the dispatch path.
//!
//! ## Deterministic State Machines
//! - Both the per-address [`balancer::LoadBalancer`] and the per-slot
//!   [`worker::WorkerSlot`] are explicit four-state machines
//!   (standby/starting/running/stopping) with a generation counter guarding
//!   against stale background tasks after a restart.
//! - Every state transition is driven by an observed event, never by
//!   elapsed wall-clock time alone (`spec.md` §5).
//!
//! ## Health and Restart
//! - [`cluster::ClusterSupervisor`] polls [`worker::WorkerSupervisor::collect_health`]
//!   once per pulse for every `running` worker and evaluates the
//!   configured [`health::HealthPolicy`]; an unhealthy worker is stopped
//!   through the same graceful path as an administrative stop.
//! - [`cluster::config::RestartPolicy`] decides whether an exited slot is
//!   restarted; the default restarts unless the slot was administratively
//!   disabled.
//!
//! # Module Organization
//!
//! ## Fleet Coordination
//! - [`cluster`] - `ClusterSupervisor`, its configuration, and its
//!   inspection snapshot
//! - [`balancer`] - `LoadBalancer`: one listening address, a round-robin
//!   ring of workers, and a connection backlog
//! - [`worker`] - the `WorkerSupervisor` capability and per-slot lifecycle
//!   state
//!
//! ## Supporting Primitives
//! - [`ring`] - generic round-robin ring buffer
//! - [`backlog`] - bounded FIFO with a configurable drop policy
//! - [`health`] - health report type and the pure health predicate
//! - [`ids`] - `LogicalId` and `ListenAddress` newtypes
//! - [`clock`] - injectable time source and one-shot timer scheduling
//! - [`logger`] - structured logging sink
//!
//! # Architecture Principles
//!
//! ## Single Logical Event Loop
//! Every public operation on [`balancer::LoadBalancer`] and
//! [`cluster::ClusterSupervisor`] takes effect against a single
//! `parking_lot::Mutex`-guarded state, never awaited across, so state
//! transitions never interleave (`spec.md` §5).
//!
//! ## Non-Blocking Public Operations
//! `start()`/`stop()` on both types return as soon as the state transition
//! is recorded; the actual work (binding a listener, draining a backlog,
//! tearing down a worker) runs on a spawned background task. Callers
//! observe completion through `inspect()` or a `stop()` done-callback, not
//! by awaiting the triggering call.
//!
//! # Standards Compliance
//!
//! - 3-layer import organization (std → third-party → internal)
//! - `chrono::DateTime<Utc>` for all timestamps
//! - `mod.rs` files hold only declarations and re-exports
//! - Generic constraints preferred over `dyn` on the dispatch path

pub mod backlog;
pub mod balancer;
pub mod clock;
pub mod cluster;
pub mod health;
pub mod ids;
pub mod logger;
pub mod prelude;
pub mod ring;
pub mod worker;
