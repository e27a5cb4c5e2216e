//! The `WorkerSupervisor` capability and the per-slot lifecycle state
//! machine that sits behind it.
//!
//! `WorkerSupervisor` itself is an external collaborator (`spec.md` §1) —
//! spawning and talking to the actual child process is out of scope here.
//! This module defines only the capability's contract and the slot
//! bookkeeping the cluster supervisor drives. Four methods
//! (`id`, `send_address`, `send_error`, `handle_connection`) are inferred
//! from the load-balancer call sites per `spec.md` §9's design note, which
//! names that inference authoritative; three more
//! (`request_start`, `request_stop`, `force_kill`) are the symmetric
//! inference from `ClusterSupervisor`'s call sites (`spec.md` §4.4's
//! "spawn each configured worker slot" / "forcibly terminates it"), since
//! the spawning *mechanism* is out of scope but the capability to invoke it
//! is not.

pub mod error;
pub mod state;

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::net::TcpStream;

// Layer 3: Internal module imports
use crate::health::HealthReport;
use crate::ids::{ListenAddress, LogicalId};

pub use error::WorkerError;
pub use state::{WorkerSlot, WorkerState};

/// The listener for a port failed; forwarded to every worker that was
/// registered with it.
///
/// Opaque by design: the concrete OS error is produced and owned by the
/// collaborator that actually calls `listen()`, out of scope here
/// (`spec.md` §1).
#[derive(Debug, Clone)]
pub struct ListenError {
    reason: String,
}

impl ListenError {
    /// Wrap a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason string.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ListenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ListenError {}

/// External capability representing one worker slot, consumed by
/// [`crate::balancer::LoadBalancer`] and implemented by the (out-of-scope)
/// worker-process subsystem.
///
/// An `async_trait` so implementors can await child-process I/O directly
/// in each method body.
#[async_trait]
pub trait WorkerSupervisor: Send + Sync + 'static {
    /// This worker's stable slot identity.
    fn id(&self) -> &LogicalId;

    /// Inform the worker that `port` is now listening at `address`.
    /// Idempotent; may be called again on re-listen.
    async fn send_address(&self, port: u16, address: ListenAddress);

    /// Inform the worker that the listener for `port` has failed; the
    /// worker should stop accepting on it.
    async fn send_error(&self, port: u16, error: ListenError);

    /// Transfer ownership of an accepted connection to the worker. The
    /// caller MUST NOT touch `connection` afterwards.
    async fn handle_connection(&self, port: u16, connection: TcpStream);

    /// Bring the child process up with the given environment. The worker
    /// is expected to eventually call back into the cluster supervisor
    /// (out of scope here) reporting its listening address, which drives
    /// the slot's `starting -> running` transition.
    async fn request_start(&self, environment: HashMap<String, String>);

    /// Ask the child process to exit gracefully. The worker is expected to
    /// exit on its own within the slot's grace window.
    async fn request_stop(&self);

    /// Forcibly terminate the child process; called once the slot's grace
    /// window has elapsed without a graceful exit.
    async fn force_kill(&self);

    /// Produce this worker's latest health report, polled once per pulse
    /// tick for `running` workers (`spec.md` §4.4 responsibility 4 — "the
    /// worker is responsible for producing one per pulse").
    async fn collect_health(&self) -> HealthReport;
}
