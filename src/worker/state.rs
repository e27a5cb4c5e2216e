//! Worker slot lifecycle state machine.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::health::HealthReport;
use crate::ids::LogicalId;

/// Lifecycle state of a worker slot (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// No child process is running for this slot.
    Standby,
    /// The child is being brought up; not yet reporting a listening address.
    Starting,
    /// The child has reported its listening address and is accepting work.
    Running,
    /// A graceful stop has been requested; waiting for the child to exit.
    Stopping,
}

/// A worker slot: a [`LogicalId`] plus its lifecycle state, timestamps, and
/// most recent health report.
///
/// A slot is created once and persists for the life of the
/// [`crate::cluster::ClusterSupervisor`]; restarts reuse the same slot
/// (`spec.md` §4.4 — "Slots are created up front... restarts reuse the
/// slot").
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    id: LogicalId,
    state: WorkerState,
    starting_at: Option<DateTime<Utc>>,
    stop_requested_at: Option<DateTime<Utc>>,
    force_stop_at: Option<DateTime<Utc>>,
    forced_stop: bool,
    health: Option<HealthReport>,
    disabled: bool,
}

impl WorkerSlot {
    /// Create a fresh slot in `standby`.
    pub fn new(id: LogicalId) -> Self {
        Self {
            id,
            state: WorkerState::Standby,
            starting_at: None,
            stop_requested_at: None,
            force_stop_at: None,
            forced_stop: false,
            health: None,
            disabled: false,
        }
    }

    /// The slot's stable identity.
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// When this episode entered `starting`/`running`. Cleared on reaching
    /// `standby` (`spec.md` §3 worker invariants).
    pub fn starting_at(&self) -> Option<DateTime<Utc>> {
        self.starting_at
    }

    /// When a stop was requested for the current episode, if any.
    pub fn stop_requested_at(&self) -> Option<DateTime<Utc>> {
        self.stop_requested_at
    }

    /// The forced-termination deadline for the current stop episode.
    pub fn force_stop_at(&self) -> Option<DateTime<Utc>> {
        self.force_stop_at
    }

    /// `true` if the most recent stop had to be escalated to a forced kill.
    pub fn forced_stop(&self) -> bool {
        self.forced_stop
    }

    /// The most recent health report, meaningful only in `running`/`stopping`.
    pub fn health(&self) -> Option<HealthReport> {
        self.health
    }

    /// `true` if this slot has been administratively disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Administratively disable the slot: it will not be auto-restarted.
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// Re-enable a previously disabled slot.
    pub fn enable(&mut self) {
        self.disabled = false;
    }

    /// `standby -> starting`. No-op (returns `false`) if not currently
    /// `standby` or if the slot is disabled.
    pub fn request_start(&mut self, now: DateTime<Utc>) -> bool {
        if self.disabled || self.state != WorkerState::Standby {
            return false;
        }
        self.state = WorkerState::Starting;
        self.starting_at = Some(now);
        self.forced_stop = false;
        true
    }

    /// `starting -> running`, on the worker reporting its listening
    /// address. No-op if not currently `starting`.
    pub fn confirm_running(&mut self) -> bool {
        if self.state != WorkerState::Starting {
            return false;
        }
        self.state = WorkerState::Running;
        true
    }

    /// `starting|running -> stopping`, arming the forced-stop deadline
    /// `now + grace`. No-op (idempotent) from `standby`/`stopping`.
    pub fn request_stop(&mut self, now: DateTime<Utc>, grace: Duration) -> bool {
        if !matches!(self.state, WorkerState::Starting | WorkerState::Running) {
            return false;
        }
        self.state = WorkerState::Stopping;
        self.stop_requested_at = Some(now);
        self.force_stop_at =
            Some(now + chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero()));
        true
    }

    /// Record that the grace window elapsed and the child had to be
    /// forcibly terminated.
    pub fn mark_forced_stop(&mut self) {
        self.forced_stop = true;
    }

    /// `* -> standby`, on the child process exiting. Clears all episode
    /// state except `forced_stop`, which callers observe before the next
    /// `request_start` clears it.
    pub fn child_exited(&mut self) {
        self.state = WorkerState::Standby;
        self.starting_at = None;
        self.stop_requested_at = None;
        self.force_stop_at = None;
        self.health = None;
    }

    /// Replace the most recent health report. Atomic: each pulse's report
    /// fully supersedes the last.
    pub fn record_health(&mut self, report: HealthReport) {
        self.health = Some(report);
    }

    /// `true` if a forced-stop deadline is armed and has elapsed as of `now`.
    pub fn force_stop_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.force_stop_at, Some(deadline) if now >= deadline)
    }
}
