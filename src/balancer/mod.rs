//! Per-listening-address load balancer: owns a listening socket, a ring of
//! worker participants, a connection backlog, and a restart policy.

pub mod error;

// Layer 1: Standard library imports
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::backlog::{Backlog, BacklogDropPolicy, BacklogEntry, DrainOutcome};
use crate::clock::{schedule, Clock, SystemClock, TimerHandle};
use crate::ids::{ListenAddress, LogicalId};
use crate::logger::Logger;
use crate::ring::Ring;
use crate::worker::{ListenError, WorkerSupervisor};

pub use error::BalancerError;

/// Lifecycle state of a [`LoadBalancer`] (`spec.md` §3/§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalancerState {
    /// No listening socket outstanding.
    Standby,
    /// `listen()` has been requested; waiting for the OS to grant it.
    Starting,
    /// Listening and (potentially) dispatching connections.
    Running,
    /// A close has been issued or is pending the next `LISTENING` event.
    Stopping,
}

/// The (requested port, requested address, requested OS accept-queue
/// depth) identity tuple from `spec.md` §3.
///
/// `accept_backlog` is the OS `listen()` backlog parameter (the kernel's
/// pending-connection queue depth) — distinct from [`crate::backlog::Backlog`],
/// this crate's FIFO of *accepted* connections awaiting a worker.
#[derive(Debug, Clone, Copy)]
pub struct RequestedAddress {
    pub ip: IpAddr,
    pub port: u16,
    pub accept_backlog: u32,
}

impl fmt::Display for RequestedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A connection queued on a [`LoadBalancer`]'s backlog.
struct QueuedConnection(TcpStream);

impl BacklogEntry for QueuedConnection {
    fn is_live(&self) -> bool {
        self.0.peer_addr().is_ok()
    }
}

/// Snapshot returned by [`LoadBalancer::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct BalancerSnapshot {
    pub state: BalancerState,
    pub port: u16,
    pub address: Option<ListenAddress>,
    pub backlog_size: usize,
}

fn worker_key<W: WorkerSupervisor>(w: &Arc<W>) -> LogicalId {
    w.id().clone()
}

/// What happened to a `LISTENING` event once the lock was released.
enum ListeningOutcome<W: WorkerSupervisor> {
    BecameRunning(Vec<Arc<W>>),
    CloseNow,
    Ignore,
}

/// What happened to an `ERROR` event once the lock was released.
enum ErrorOutcome<W: WorkerSupervisor> {
    FanOutAndClose(Vec<Arc<W>>),
    CloseSilently,
    Ignore,
    Invariant,
}

/// Where an accepted connection should go once the lock was released.
enum ConnectionOutcome<W: WorkerSupervisor> {
    Dispatch(Arc<W>),
    Enqueue,
    Drop,
}

struct Inner<W: WorkerSupervisor> {
    state: BalancerState,
    next_state_starting: bool,
    address: Option<ListenAddress>,
    ring: Ring<Arc<W>, LogicalId, fn(&Arc<W>) -> LogicalId>,
    backlog: Backlog<QueuedConnection>,
    restart_timer: Option<TimerHandle>,
    /// Incremented every time `standby -> starting` begins a new listen
    /// attempt; a background listen/accept task checks this before acting
    /// so a stale task from a superseded epoch becomes a no-op.
    generation: u64,
    /// Signals the live `accept_loop` to close its listener, armed while
    /// `running` and consumed by `stop()`. Not armed in `starting`, where
    /// there is no listener yet to close (the pending bind is closed via
    /// `ListeningOutcome::CloseNow` instead).
    close_tx: Option<oneshot::Sender<()>>,
    on_standby: Vec<Box<dyn FnOnce() + Send>>,
}

impl<W: WorkerSupervisor> Inner<W> {
    fn new(backlog_cap: Option<usize>, drop_policy: BacklogDropPolicy) -> Self {
        Self {
            state: BalancerState::Standby,
            next_state_starting: false,
            address: None,
            ring: Ring::new(worker_key::<W>),
            backlog: match backlog_cap {
                Some(cap) => Backlog::bounded(cap, drop_policy),
                None => Backlog::unbounded(),
            },
            restart_timer: None,
            generation: 0,
            close_tx: None,
            on_standby: Vec::new(),
        }
    }

    fn fire_on_standby(&mut self) {
        for cb in self.on_standby.drain(..) {
            cb();
        }
    }
}

/// Per-address round-robin TCP load balancer.
///
/// Generic over `W: WorkerSupervisor` rather than `dyn`: the fleet behind
/// one balancer is homogeneous (`spec.md` §1), so a single concrete `W`
/// per balancer is sufficient and keeps dispatch allocation-free.
pub struct LoadBalancer<W: WorkerSupervisor> {
    requested: RequestedAddress,
    restart_delay: Duration,
    drain_batch_per_worker: Option<usize>,
    logger: Arc<dyn Logger>,
    #[allow(dead_code)] // retained for future wall-clock inspection (e.g. epoch start time)
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner<W>>>,
}

impl<W: WorkerSupervisor> Clone for LoadBalancer<W> {
    fn clone(&self) -> Self {
        Self {
            requested: self.requested,
            restart_delay: self.restart_delay,
            drain_batch_per_worker: self.drain_batch_per_worker,
            logger: Arc::clone(&self.logger),
            clock: Arc::clone(&self.clock),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: WorkerSupervisor> LoadBalancer<W> {
    /// Create a new balancer in `standby` for the given identity.
    pub fn new(requested: RequestedAddress, logger: Arc<dyn Logger>) -> Self {
        Self::with_clock(requested, logger, Arc::new(SystemClock))
    }

    /// Create a new balancer with an injectable [`Clock`] (for tests).
    pub fn with_clock(requested: RequestedAddress, logger: Arc<dyn Logger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            requested,
            restart_delay: Duration::ZERO,
            drain_batch_per_worker: None,
            logger,
            clock,
            inner: Arc::new(Mutex::new(Inner::new(None, BacklogDropPolicy::Oldest))),
        }
    }

    /// Configure the restart delay armed when a `start()` arrives during
    /// `stopping` (`spec.md` §4.3 restart policy). Default: fires next tick.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Cap how many backlog entries are handed to a newly joined worker in
    /// one `add_worker` drain pass (`spec.md` §9 thundering-herd note).
    pub fn with_drain_batch_per_worker(mut self, max: usize) -> Self {
        self.drain_batch_per_worker = Some(max);
        self
    }

    /// Configure the backlog's capacity and drop policy. Default:
    /// unbounded, preserving source behavior (`spec.md` §4.2/§9).
    pub fn with_backlog_cap(self, cap: usize, drop_policy: BacklogDropPolicy) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.backlog = Backlog::bounded(cap, drop_policy);
        }
        self
    }

    fn log_fields(&self) -> serde_json::Value {
        serde_json::json!({ "address": self.requested.to_string() })
    }

    /// `start()`: idempotent (`spec.md` §4.3).
    pub fn start(&self) {
        let generation = {
            let mut inner = self.inner.lock();
            match inner.state {
                BalancerState::Standby => {
                    inner.state = BalancerState::Starting;
                    inner.generation += 1;
                    self.logger.debug("balancer starting", self.log_fields());
                    Some(inner.generation)
                }
                BalancerState::Stopping => {
                    inner.next_state_starting = true;
                    self.logger.debug("balancer restart latched", self.log_fields());
                    None
                }
                BalancerState::Starting | BalancerState::Running => None,
            }
        };
        let Some(generation) = generation else {
            return;
        };
        let this = self.clone();
        tokio::spawn(async move { this.run_listen_attempt(generation).await });
    }

    async fn run_listen_attempt(&self, generation: u64) {
        let addr = SocketAddr::new(self.requested.ip, self.requested.port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let bound = listener.local_addr().unwrap_or(addr);
                self.on_listening(generation, bound, listener).await;
            }
            Err(err) => {
                self.on_error(generation, ListenError::new(err.to_string())).await;
            }
        }
    }

    async fn on_listening(&self, generation: u64, bound: SocketAddr, listener: TcpListener) {
        let (close_tx, close_rx) = oneshot::channel();
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            match inner.state {
                BalancerState::Starting => {
                    inner.state = BalancerState::Running;
                    inner.address = Some(ListenAddress::new(bound));
                    // Armed in the same locked transition as Running so a
                    // concurrent stop() can never observe `close_tx` still
                    // unset and silently drop its close signal.
                    inner.close_tx = Some(close_tx);
                    let mut workers = Vec::new();
                    inner.ring.for_each(|w| workers.push(Arc::clone(w)));
                    ListeningOutcome::BecameRunning(workers)
                }
                BalancerState::Stopping => ListeningOutcome::CloseNow,
                // running/standby observing LISTENING again is not part of
                // the event table; treat as a stray duplicate and ignore.
                BalancerState::Running | BalancerState::Standby => ListeningOutcome::Ignore,
            }
        };

        match outcome {
            ListeningOutcome::BecameRunning(workers) => {
                self.logger.info(
                    "balancer running",
                    serde_json::json!({ "address": bound.to_string() }),
                );
                for w in &workers {
                    w.send_address(self.requested.port, ListenAddress::new(bound)).await;
                }
                self.drain_backlog(None).await;

                if self.inner.lock().state == BalancerState::Stopping {
                    // stop() raced in during the broadcast/drain above and
                    // already consumed close_tx; close now instead of
                    // starting to accept on a listener nobody wants.
                    drop(listener);
                    self.on_close(generation).await;
                    return;
                }
                self.accept_loop(generation, listener, close_rx).await;
            }
            ListeningOutcome::CloseNow => {
                self.logger.debug("closing deferred listener", self.log_fields());
                drop(listener);
                self.on_close(generation).await;
            }
            ListeningOutcome::Ignore => {}
        }
    }

    async fn accept_loop(&self, generation: u64, listener: TcpListener, mut close_rx: oneshot::Receiver<()>) {
        loop {
            if self.inner.lock().generation != generation {
                return;
            }
            tokio::select! {
                biased;
                _ = &mut close_rx => {
                    self.on_close(generation).await;
                    return;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _peer)) => {
                            if self.inner.lock().generation != generation {
                                return;
                            }
                            self.on_connection(generation, stream).await;
                        }
                        Err(err) => {
                            self.on_error(generation, ListenError::new(err.to_string())).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// `CONNECTION` event: dispatch to the ring head, or enqueue on the
    /// backlog (`spec.md` §4.3).
    async fn on_connection(&self, generation: u64, stream: TcpStream) {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != BalancerState::Running {
                ConnectionOutcome::Drop
            } else if !inner.ring.is_empty() {
                match inner.ring.rotate_head().map(Arc::clone) {
                    Some(worker) => ConnectionOutcome::Dispatch(worker),
                    None => ConnectionOutcome::Enqueue,
                }
            } else {
                ConnectionOutcome::Enqueue
            }
        };
        match outcome {
            ConnectionOutcome::Dispatch(worker) => {
                worker.handle_connection(self.requested.port, stream).await;
            }
            ConnectionOutcome::Enqueue => {
                self.inner.lock().backlog.push(QueuedConnection(stream));
                self.logger.info("backlog growth", self.log_fields());
            }
            ConnectionOutcome::Drop => {
                // Generation superseded or no longer running; the
                // connection is simply dropped, closing the socket.
            }
        }
    }

    /// Drain the backlog one rotation step per entry, stopping at `max`
    /// entries if given (`spec.md` §4.3 backlog drain policy).
    async fn drain_backlog(&self, max: Option<usize>) {
        let mut dispatched = 0usize;
        loop {
            if let Some(max) = max {
                if dispatched >= max {
                    break;
                }
            }
            let next = {
                let mut inner = self.inner.lock();
                if inner.state != BalancerState::Running
                    || inner.ring.is_empty()
                    || inner.backlog.is_empty()
                {
                    None
                } else {
                    let worker = inner.ring.rotate_head().map(Arc::clone);
                    worker.and_then(|w| {
                        let mut taken = None;
                        inner.backlog.drain_into(Some(1), |entry| {
                            taken = Some(entry);
                            DrainOutcome::Dispatched
                        });
                        taken.map(|entry| (w, entry))
                    })
                }
            };
            match next {
                Some((worker, QueuedConnection(stream))) => {
                    worker.handle_connection(self.requested.port, stream).await;
                    dispatched += 1;
                }
                None => break,
            }
        }
    }

    /// `ERROR` event (`spec.md` §4.3/§7): fanned out in `running`, silent
    /// self-stop in `starting`, fatal invariant violation in `standby`.
    async fn on_error(&self, generation: u64, error: ListenError) {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                ErrorOutcome::Ignore
            } else {
                match inner.state {
                    BalancerState::Running => {
                        let mut workers = Vec::new();
                        inner.ring.for_each(|w| workers.push(Arc::clone(w)));
                        inner.state = BalancerState::Stopping;
                        ErrorOutcome::FanOutAndClose(workers)
                    }
                    BalancerState::Starting => {
                        inner.state = BalancerState::Stopping;
                        ErrorOutcome::CloseSilently
                    }
                    BalancerState::Stopping => ErrorOutcome::CloseSilently,
                    BalancerState::Standby => ErrorOutcome::Invariant,
                }
            }
        };
        match outcome {
            ErrorOutcome::FanOutAndClose(workers) => {
                self.logger.warn("listen error, fanning out", self.log_fields());
                for w in &workers {
                    w.send_error(self.requested.port, error.clone()).await;
                }
                self.on_close(generation).await;
            }
            ErrorOutcome::CloseSilently => {
                self.logger.debug("listen error while starting/stopping", self.log_fields());
                self.on_close(generation).await;
            }
            ErrorOutcome::Ignore => {}
            ErrorOutcome::Invariant => {
                self.logger.error("invariant violation", self.log_fields());
                panic!(
                    "nanny-core: ERROR observed on balancer {} while in standby",
                    self.requested
                );
            }
        }
    }

    /// `CLOSE` event: transition to `standby`, optionally latching a
    /// restart (`spec.md` §4.3).
    async fn on_close(&self, generation: u64) {
        let restart = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            match inner.state {
                BalancerState::Running | BalancerState::Stopping | BalancerState::Starting => {
                    inner.state = BalancerState::Standby;
                    inner.address = None;
                    inner.close_tx = None;
                    let restart = inner.next_state_starting;
                    inner.next_state_starting = false;
                    inner.fire_on_standby();
                    restart
                }
                BalancerState::Standby => {
                    self.logger.error("invariant violation", self.log_fields());
                    panic!(
                        "nanny-core: CLOSE observed on balancer {} while in standby",
                        self.requested
                    );
                }
            }
        };
        self.logger.info("balancer standby", self.log_fields());
        if restart {
            let this = self.clone();
            let handle = schedule(self.restart_delay, move || {
                this.start();
            });
            self.inner.lock().restart_timer = Some(handle);
        }
    }

    /// `stop(onDone)`: idempotent (`spec.md` §4.3). `on_done` fires once
    /// the balancer next reaches `standby` (immediately if already there).
    pub fn stop(&self, on_done: Option<Box<dyn FnOnce() + Send>>) {
        let already_standby = {
            let mut inner = self.inner.lock();
            if let Some(timer) = inner.restart_timer.take() {
                timer.cancel();
            }
            match inner.state {
                BalancerState::Running | BalancerState::Starting => {
                    inner.state = BalancerState::Stopping;
                    if let Some(cb) = on_done {
                        inner.on_standby.push(cb);
                    }
                    if let Some(tx) = inner.close_tx.take() {
                        let _ = tx.send(());
                    }
                    false
                }
                BalancerState::Stopping => {
                    inner.next_state_starting = false;
                    if let Some(cb) = on_done {
                        inner.on_standby.push(cb);
                    }
                    false
                }
                BalancerState::Standby => true,
            }
        };
        if already_standby {
            if let Some(cb) = on_done {
                cb();
            }
        }
    }

    /// Append a worker to the ring. If running, notify it of the current
    /// address and trigger a backlog drain (`spec.md` §4.3).
    pub fn add_worker(&self, worker: Arc<W>) {
        let notify = {
            let mut inner = self.inner.lock();
            inner.ring.push(Arc::clone(&worker));
            if inner.state == BalancerState::Running {
                inner.address
            } else {
                None
            }
        };
        if let Some(address) = notify {
            let this = self.clone();
            let drain_max = self.drain_batch_per_worker;
            tokio::spawn(async move {
                worker.send_address(this.requested.port, address).await;
                this.drain_backlog(drain_max).await;
            });
        }
    }

    /// Remove a worker from the ring. Tolerant of absence.
    pub fn remove_worker(&self, id: &LogicalId) {
        self.inner.lock().ring.remove(id);
    }

    /// Iterate the ring without rotating.
    pub fn for_each_worker(&self, f: impl FnMut(&Arc<W>)) {
        self.inner.lock().ring.for_each(f);
    }

    /// Current state, port, bound address, and backlog depth.
    pub fn inspect(&self) -> BalancerSnapshot {
        let inner = self.inner.lock();
        BalancerSnapshot {
            state: inner.state,
            port: self.requested.port,
            address: inner.address,
            backlog_size: inner.backlog.size(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BalancerState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration as StdDuration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct Recorded {
        addresses: Vec<ListenAddress>,
        connections: Vec<u16>,
        errors: Vec<String>,
    }

    struct MockWorker {
        id: LogicalId,
        recorded: AsyncMutex<Recorded>,
    }

    impl MockWorker {
        fn new(id: LogicalId) -> Arc<Self> {
            Arc::new(Self {
                id,
                recorded: AsyncMutex::new(Recorded::default()),
            })
        }

        async fn connection_count(&self) -> usize {
            self.recorded.lock().await.connections.len()
        }
    }

    #[async_trait::async_trait]
    impl WorkerSupervisor for MockWorker {
        fn id(&self) -> &LogicalId {
            &self.id
        }

        async fn send_address(&self, _port: u16, address: ListenAddress) {
            self.recorded.lock().await.addresses.push(address);
        }

        async fn send_error(&self, _port: u16, error: ListenError) {
            self.recorded.lock().await.errors.push(error.reason().to_string());
        }

        async fn handle_connection(&self, port: u16, _connection: TcpStream) {
            self.recorded.lock().await.connections.push(port);
        }

        async fn request_start(&self, _environment: std::collections::HashMap<String, String>) {}
        async fn request_stop(&self) {}
        async fn force_kill(&self) {}

        async fn collect_health(&self) -> crate::health::HealthReport {
            crate::health::HealthReport {
                memory_usage: crate::health::MemoryUsage {
                    rss: 0,
                    heap_total: 0,
                    heap_used: 0,
                },
                load_ms: 0,
            }
        }
    }

    fn requested(port: u16) -> RequestedAddress {
        RequestedAddress {
            ip: IpAddr::from([127, 0, 0, 1]),
            port,
            accept_backlog: 128,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool, timeout: StdDuration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while !check() {
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not reached within {timeout:?}");
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn stop_on_standby_invokes_callback_immediately() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        lb.stop(Some(Box::new(move || {
            fired2.store(true, Ordering::SeqCst);
        })));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(lb.state(), BalancerState::Standby);
    }

    #[tokio::test]
    async fn add_worker_while_standby_does_not_notify() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        let worker = MockWorker::new(LogicalId::from_index(0));
        lb.add_worker(Arc::clone(&worker));
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(worker.recorded.lock().await.addresses.len(), 0);
        assert_eq!(worker.connection_count().await, 0);
    }

    #[tokio::test]
    async fn start_reaches_running_and_dispatches_round_robin() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        let w0 = MockWorker::new(LogicalId::from_index(0));
        let w1 = MockWorker::new(LogicalId::from_index(1));
        lb.add_worker(Arc::clone(&w0));
        lb.add_worker(Arc::clone(&w1));

        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;

        let bound = lb.inspect().address.expect("address set once running").as_socket_addr();

        TcpStream::connect(bound).await.expect("first connect");
        wait_until(
            || w0.recorded.try_lock().map(|r| r.connections.len()).unwrap_or(0) == 1,
            StdDuration::from_secs(1),
        )
        .await;

        TcpStream::connect(bound).await.expect("second connect");
        wait_until(
            || w1.recorded.try_lock().map(|r| r.connections.len()).unwrap_or(0) == 1,
            StdDuration::from_secs(1),
        )
        .await;

        assert_eq!(w0.connection_count().await, 1);
        assert_eq!(w1.connection_count().await, 1);
    }

    #[tokio::test]
    async fn start_is_idempotent_while_already_starting() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        lb.start();
        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn stop_after_running_reaches_standby_and_fires_callback() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;

        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        lb.stop(Some(Box::new(move || {
            fired2.store(true, Ordering::SeqCst);
        })));

        wait_until(|| fired.load(Ordering::SeqCst), StdDuration::from_secs(2)).await;
        assert_eq!(lb.state(), BalancerState::Standby);
    }

    #[tokio::test]
    async fn restart_latched_during_stopping_brings_balancer_back_up() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;

        lb.stop(None);
        // Racing start() in right after stop(): if it lands before standby is
        // reached, it latches as next_state_starting; if it lands after, it
        // begins a fresh standby->starting transition. Either way the
        // balancer must end up running again.
        lb.start();

        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn backlog_drains_once_a_worker_joins() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;
        let bound = lb.inspect().address.expect("address set once running").as_socket_addr();

        TcpStream::connect(bound).await.expect("connect before any worker joins");
        wait_until(|| lb.inspect().backlog_size == 1, StdDuration::from_secs(1)).await;

        let worker = MockWorker::new(LogicalId::from_index(0));
        lb.add_worker(Arc::clone(&worker));

        wait_until(
            || worker.recorded.try_lock().map(|r| r.connections.len()).unwrap_or(0) == 1,
            StdDuration::from_secs(1),
        )
        .await;
        assert_eq!(lb.inspect().backlog_size, 0);
    }

    #[tokio::test]
    async fn listen_error_while_running_fans_out_and_closes() {
        let lb: LoadBalancer<MockWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
        let w0 = MockWorker::new(LogicalId::from_index(0));
        let w1 = MockWorker::new(LogicalId::from_index(1));
        lb.add_worker(Arc::clone(&w0));
        lb.add_worker(Arc::clone(&w1));

        lb.start();
        wait_until(|| lb.state() == BalancerState::Running, StdDuration::from_secs(2)).await;
        let generation = lb.inner.lock().generation;

        lb.on_error(generation, ListenError::new("accept() failed")).await;

        wait_until(|| lb.state() == BalancerState::Standby, StdDuration::from_secs(2)).await;
        assert_eq!(w0.recorded.lock().await.errors, vec!["accept() failed".to_string()]);
        assert_eq!(w1.recorded.lock().await.errors, vec!["accept() failed".to_string()]);

        // No further dispatch once standby: a late connection just queues.
        let bound_before_close = lb.inspect().address;
        assert!(bound_before_close.is_none());
        assert_eq!(w0.connection_count().await, 0);
        assert_eq!(w1.connection_count().await, 0);
    }
}
