//! The bounded FIFO of accepted connections awaiting a worker.

// Layer 1: Standard library imports
use std::collections::VecDeque;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// Entries queued on a [`Backlog`] must be able to report whether the
/// underlying connection is still live, so the drain can skip stale
/// entries (`spec.md` §4.2).
pub trait BacklogEntry {
    /// `false` if the underlying connection is already closed.
    fn is_live(&self) -> bool;
}

/// What the drain sink decided about one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The entry was handed to a worker.
    Dispatched,
    /// The sink could not take the entry right now (e.g. ring is empty);
    /// the drain stops rather than losing the entry.
    Refused,
}

/// Which end of the backlog to drop entries from once `cap` is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacklogDropPolicy {
    /// Drop the longest-waiting entry.
    Oldest,
    /// Drop the entry that was about to be pushed.
    Newest,
}

/// Bounded FIFO of connections awaiting a worker.
///
/// `cap: None` preserves the source's unbounded behavior, which is the
/// default per `spec.md` §9's open question.
pub struct Backlog<C> {
    entries: VecDeque<C>,
    cap: Option<usize>,
    drop_policy: BacklogDropPolicy,
}

impl<C> Backlog<C> {
    /// Create an unbounded backlog (default configuration).
    pub fn unbounded() -> Self {
        Self {
            entries: VecDeque::new(),
            cap: None,
            drop_policy: BacklogDropPolicy::Oldest,
        }
    }

    /// Create a backlog capped at `cap` entries, dropping per `drop_policy`
    /// once full.
    pub fn bounded(cap: usize, drop_policy: BacklogDropPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: Some(cap),
            drop_policy,
        }
    }

    /// Enqueue a connection. If the backlog is at capacity, drops an entry
    /// per the configured [`BacklogDropPolicy`] to make room.
    pub fn push(&mut self, entry: C) {
        if let Some(cap) = self.cap {
            if self.entries.len() >= cap {
                match self.drop_policy {
                    BacklogDropPolicy::Oldest => {
                        self.entries.pop_front();
                    }
                    BacklogDropPolicy::Newest => {
                        // The entry about to be pushed is the newest; refuse it.
                        return;
                    }
                }
            }
        }
        self.entries.push_back(entry);
    }

    /// Number of entries currently queued.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the backlog holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: BacklogEntry> Backlog<C> {
    /// Drain entries in FIFO order, invoking `sink` once per live entry
    /// until empty or the sink refuses. Entries whose connection is
    /// already closed are dropped without invoking `sink`.
    ///
    /// If `max` is `Some`, at most that many entries are dispatched in
    /// this call, with the rest left queued — this bounds the per-worker
    /// handoff batch on `addWorker` to avoid saturating the first worker
    /// to join the ring (`spec.md` §9).
    pub fn drain_into(&mut self, max: Option<usize>, mut sink: impl FnMut(C) -> DrainOutcome) {
        let mut dispatched = 0usize;
        loop {
            if let Some(max) = max {
                if dispatched >= max {
                    break;
                }
            }
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            if !entry.is_live() {
                continue;
            }
            match sink(entry) {
                DrainOutcome::Dispatched => dispatched += 1,
                DrainOutcome::Refused => {
                    break;
                }
            }
        }
    }
}
