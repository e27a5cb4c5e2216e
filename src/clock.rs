//! Monotonic time source and one-shot timers.
//!
//! The balancer and cluster supervisor gate transitions on observable
//! events, never on wall clock alone, but they still need to *timestamp*
//! transitions (`startingAt`, `forceStopAt`, ...) and *schedule* single
//! delayed callbacks (the LB restart timer, a worker's forced-stop
//! deadline). Both uses go through [`Clock`] so tests can control time
//! without real sleeps.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A source of the current time.
///
/// Production code uses [`SystemClock`]; tests use [`TestClock`] so that
/// forced-stop and restart-timer behavior (`spec.md` P7) can be asserted
/// deterministically.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually-advanced clock for tests.
#[derive(Debug, Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    /// Create a test clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A handle to a pending one-shot timer.
///
/// Dropping or calling [`TimerHandle::cancel`] prevents the scheduled
/// closure from firing, matching "stopping the LB cancels a pending
/// restart timer" (`spec.md` §4.3).
#[derive(Debug)]
pub struct TimerHandle {
    join: JoinHandle<()>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl TimerHandle {
    /// Cancel the timer. No-op if it already fired.
    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        self.join.abort();
    }
}

/// Schedule `callback` to run after `delay` on the Tokio runtime, unless
/// cancelled first via the returned [`TimerHandle`].
///
/// `delay` of zero fires on the next tick, matching `spec.md`'s "0 means
/// next tick" for the restart timer.
pub fn schedule<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let (cancel_tx, mut cancel_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => callback(),
            _ = &mut cancel_rx => {}
        }
    });
    TimerHandle {
        join,
        cancel_tx: Some(cancel_tx),
    }
}
