//! `ClusterSupervisor`: owns the worker slots and load balancers for a
//! fleet, runs the health-pulse loop, and drives fleet-wide start/stop.

pub mod config;
pub mod error;
pub mod inspect;

// Layer 1: Standard library imports
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use crate::balancer::{BalancerState, LoadBalancer, RequestedAddress};
use crate::clock::{schedule, Clock, SystemClock, TimerHandle};
use crate::ids::LogicalId;
use crate::logger::Logger;
use crate::worker::{WorkerError, WorkerSlot, WorkerState, WorkerSupervisor};

pub use config::{NannyConfig, NannyConfigBuilder};
pub use error::{ClusterError, ConfigError};
pub use inspect::{ClusterSupervisorState, WorkerSnapshot};

/// Top-level lifecycle state of a [`ClusterSupervisor`] (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterState {
    /// No worker slots are active and the pulse ticker is not running.
    Standby,
    /// Workers have been spawned and the pulse ticker is running.
    Running,
    /// Every worker and load balancer has been asked to stop; waiting for
    /// all of them to reach `standby`.
    Stopping,
}

struct Inner<W: WorkerSupervisor> {
    config: NannyConfig,
    worker_factory: Arc<dyn Fn(&LogicalId) -> Arc<W> + Send + Sync>,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    slots: DashMap<LogicalId, Mutex<WorkerSlot>>,
    workers: DashMap<LogicalId, Arc<W>>,
    balancers: DashMap<u16, LoadBalancer<W>>,
    /// Pending forced-stop timers, keyed by slot, cancelled on graceful exit.
    force_timers: DashMap<LogicalId, TimerHandle>,
    state: Mutex<ClusterState>,
    pulse_handle: Mutex<Option<JoinHandle<()>>>,
    on_standby: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

/// Owns a fixed fleet of worker slots and the load balancers they
/// register with, and drives both toward `running` or `standby`.
///
/// Generic over `W: WorkerSupervisor`, matching [`crate::balancer::LoadBalancer`]'s
/// preference for a type parameter over `dyn` (the fleet is homogeneous,
/// `spec.md` §1). Construction takes a `worker_factory` closure that
/// produces one `Arc<W>` per slot — the concrete mechanism for spawning and
/// talking to the child process stays an external collaborator
/// (`spec.md` §1); this crate only needs something that decides *how* to
/// produce a handle, not what the handle does internally.
pub struct ClusterSupervisor<W: WorkerSupervisor> {
    inner: Arc<Inner<W>>,
}

impl<W: WorkerSupervisor> Clone for ClusterSupervisor<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: WorkerSupervisor> ClusterSupervisor<W> {
    /// Create a new cluster supervisor in `standby`.
    pub fn new(
        config: NannyConfig,
        worker_factory: impl Fn(&LogicalId) -> Arc<W> + Send + Sync + 'static,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self::with_clock(config, worker_factory, logger, Arc::new(SystemClock))
    }

    /// Create a new cluster supervisor with an injectable [`Clock`] (for tests).
    pub fn with_clock(
        config: NannyConfig,
        worker_factory: impl Fn(&LogicalId) -> Arc<W> + Send + Sync + 'static,
        logger: Arc<dyn Logger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                worker_factory: Arc::new(worker_factory),
                logger,
                clock,
                slots: DashMap::new(),
                workers: DashMap::new(),
                balancers: DashMap::new(),
                force_timers: DashMap::new(),
                state: Mutex::new(ClusterState::Standby),
                pulse_handle: Mutex::new(None),
                on_standby: Mutex::new(Vec::new()),
            }),
        }
    }

    fn with_slot<R>(&self, id: &LogicalId, f: impl FnOnce(&mut WorkerSlot) -> R) -> Option<R> {
        self.inner.slots.get(id).map(|entry| f(&mut entry.lock()))
    }

    fn ensure_slot(&self, id: &LogicalId) {
        self.inner
            .slots
            .entry(id.clone())
            .or_insert_with(|| Mutex::new(WorkerSlot::new(id.clone())));
    }

    fn ensure_worker_handle(&self, id: &LogicalId) -> Arc<W> {
        self.inner
            .workers
            .entry(id.clone())
            .or_insert_with(|| (self.inner.worker_factory)(id))
            .value()
            .clone()
    }

    fn get_worker(&self, id: &LogicalId) -> Option<Arc<W>> {
        self.inner.workers.get(id).map(|entry| entry.value().clone())
    }

    fn get_or_create_balancer(&self, port: u16, accept_backlog: u32) -> LoadBalancer<W> {
        self.inner
            .balancers
            .entry(port)
            .or_insert_with(|| {
                let requested = RequestedAddress {
                    ip: IpAddr::from([0, 0, 0, 0]),
                    port,
                    accept_backlog,
                };
                let mut lb = LoadBalancer::with_clock(
                    requested,
                    Arc::clone(&self.inner.logger),
                    Arc::clone(&self.inner.clock),
                );
                if let Some(cap) = self.inner.config.backlog_cap {
                    lb = lb.with_backlog_cap(cap, self.inner.config.backlog_drop_policy);
                }
                if let Some(max) = self.inner.config.drain_batch_per_worker {
                    lb = lb.with_drain_batch_per_worker(max);
                }
                lb
            })
            .value()
            .clone()
    }

    fn id_fields(&self, id: &LogicalId) -> serde_json::Value {
        serde_json::json!({ "id": id.to_string() })
    }

    /// `start()`: spawn each configured worker slot and start the
    /// health-pulse ticker. Idempotent (`spec.md` §4.4).
    pub fn start(&self) {
        let should_spawn = {
            let mut state = self.inner.state.lock();
            if *state == ClusterState::Standby {
                *state = ClusterState::Running;
                true
            } else {
                false
            }
        };
        if !should_spawn {
            return;
        }
        self.logger.info("cluster starting", serde_json::Value::Null);
        let this = self.clone();
        tokio::spawn(async move { this.bootstrap().await });
    }

    async fn bootstrap(&self) {
        let ids = self.inner.config.logical_ids.clone();
        for id in ids {
            self.start_worker(&id).await;
        }
        self.spawn_pulse_ticker();
    }

    fn spawn_pulse_ticker(&self) {
        let this = self.clone();
        let pulse = self.inner.config.pulse;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(pulse);
            interval.tick().await; // first tick is immediate; skip it
            loop {
                interval.tick().await;
                this.run_pulse().await;
            }
        });
        *self.inner.pulse_handle.lock() = Some(handle);
    }

    async fn run_pulse(&self) {
        let running: Vec<LogicalId> = self
            .inner
            .slots
            .iter()
            .filter(|entry| entry.value().lock().state() == WorkerState::Running)
            .map(|entry| entry.key().clone())
            .collect();
        for id in running {
            let Some(worker) = self.get_worker(&id) else {
                continue;
            };
            let report = worker.collect_health().await;
            let healthy = self.inner.config.is_healthy.is_healthy(&report);
            self.with_slot(&id, |slot| slot.record_health(report));
            if !healthy {
                self.logger.warn("worker unhealthy", self.id_fields(&id));
                let _ = self.stop_worker(&id).await;
            }
        }
    }

    /// Bring up the given slot: register (or reuse) its worker handle and
    /// ask it to start. No-op if the slot is already active or disabled.
    pub async fn start_worker(&self, id: &LogicalId) {
        self.ensure_slot(id);
        let should_start = self
            .with_slot(id, |slot| slot.request_start(self.inner.clock.now()))
            .unwrap_or(false);
        if !should_start {
            return;
        }
        let worker = self.ensure_worker_handle(id);
        let environment = self.inner.config.create_environment.environment_for(id);
        self.logger.debug("worker starting", self.id_fields(id));
        worker.request_start(environment).await;
    }

    /// Request a graceful stop of the given slot: removed from every load
    /// balancer's ring before the worker is asked to stop (`spec.md` §4.4
    /// responsibility 5), with a forced-kill timer armed for the grace
    /// window. No-op if the slot is not currently active.
    pub async fn stop_worker(&self, id: &LogicalId) -> Result<(), ClusterError> {
        if !self.inner.slots.contains_key(id) {
            return Err(WorkerError::NotFound { id: id.clone() }.into());
        }
        let now = self.inner.clock.now();
        let grace = self.inner.config.grace_window;
        let should_stop = self
            .with_slot(id, |slot| slot.request_stop(now, grace))
            .unwrap_or(false);
        if !should_stop {
            return Ok(());
        }
        for entry in self.inner.balancers.iter() {
            entry.value().remove_worker(id);
        }
        if let Some(worker) = self.get_worker(id) {
            worker.request_stop().await;
        }
        self.arm_force_stop_timer(id.clone(), grace);
        self.logger.debug("worker stopping", self.id_fields(id));
        Ok(())
    }

    fn arm_force_stop_timer(&self, id: LogicalId, grace: Duration) {
        if let Some((_, old)) = self.inner.force_timers.remove(&id) {
            old.cancel();
        }
        let this = self.clone();
        let timer_id = id.clone();
        let handle = schedule(grace, move || {
            let this = this.clone();
            tokio::spawn(async move { this.escalate_to_force_kill(&timer_id).await });
        });
        self.inner.force_timers.insert(id, handle);
    }

    async fn escalate_to_force_kill(&self, id: &LogicalId) {
        let due = self
            .with_slot(id, |slot| {
                slot.state() == WorkerState::Stopping && slot.force_stop_due(self.inner.clock.now())
            })
            .unwrap_or(false);
        if !due {
            return;
        }
        self.with_slot(id, |slot| slot.mark_forced_stop());
        if let Some(worker) = self.get_worker(id) {
            self.logger.warn("forcing worker termination", self.id_fields(id));
            worker.force_kill().await;
        }
        let _ = self.worker_exited(id).await;
    }

    /// Record that the slot's child process has exited: return the slot to
    /// `standby`, remove it from every load balancer, and — if the cluster
    /// is `running` and the slot should be restarted per the configured
    /// [`config::RestartPolicy`] — start it again immediately.
    pub async fn worker_exited(&self, id: &LogicalId) -> Result<(), ClusterError> {
        if !self.inner.slots.contains_key(id) {
            return Err(WorkerError::NotFound { id: id.clone() }.into());
        }
        self.with_slot(id, |slot| slot.child_exited());
        for entry in self.inner.balancers.iter() {
            entry.value().remove_worker(id);
        }
        if let Some((_, timer)) = self.inner.force_timers.remove(id) {
            timer.cancel();
        }
        self.logger.info("worker standby", self.id_fields(id));

        let cluster_running = *self.inner.state.lock() == ClusterState::Running;
        if cluster_running {
            let should_restart = self
                .with_slot(id, |slot| self.inner.config.restart_policy.should_restart(slot))
                .unwrap_or(false);
            if should_restart {
                self.start_worker(id).await;
            }
        } else {
            self.check_fully_stopped().await;
        }
        Ok(())
    }

    /// Record that the worker wants to listen on `port`: confirm the slot's
    /// `starting -> running` transition, register it with (or create) the
    /// matching load balancer, and start that balancer.
    ///
    /// This collapses two events implied by `spec.md` §2's control-flow
    /// narrative ("worker reports its listening port" and "worker receives
    /// its broadcast address") into one call, the same way the
    /// `WorkerSupervisor` contract itself is inferred rather than
    /// specified (`spec.md` §9) — the load balancer still performs the
    /// actual `sendAddress` broadcast once it reaches `running`.
    pub async fn worker_listening(&self, id: &LogicalId, port: u16, accept_backlog: u32) -> Result<(), ClusterError> {
        let worker = self
            .get_worker(id)
            .ok_or_else(|| WorkerError::NotFound { id: id.clone() })?;
        let confirmed = self.with_slot(id, |slot| slot.confirm_running()).unwrap_or(false);
        if !confirmed {
            return Ok(());
        }
        let lb = self.get_or_create_balancer(port, accept_backlog);
        lb.add_worker(worker);
        lb.start();
        self.logger.info("worker registered with load balancer", self.id_fields(id));
        Ok(())
    }

    /// Administratively disable a slot: it will not be auto-restarted.
    pub fn disable_worker(&self, id: &LogicalId) -> Result<(), ClusterError> {
        self.with_slot(id, |slot| slot.disable())
            .ok_or_else(|| WorkerError::NotFound { id: id.clone() }.into())
    }

    /// Re-enable a previously disabled slot.
    pub fn enable_worker(&self, id: &LogicalId) -> Result<(), ClusterError> {
        self.with_slot(id, |slot| slot.enable())
            .ok_or_else(|| WorkerError::NotFound { id: id.clone() }.into())
    }

    /// `stop()`: mark every worker for graceful stop, stop every load
    /// balancer, and — once all of them reach `standby` — stop the pulse
    /// ticker. Idempotent; `on_done` fires once the cluster reaches
    /// `standby` (immediately if already there).
    pub fn stop(&self, on_done: Option<Box<dyn FnOnce() + Send>>) {
        let already_standby = {
            let mut state = self.inner.state.lock();
            match *state {
                ClusterState::Standby => true,
                ClusterState::Running => {
                    *state = ClusterState::Stopping;
                    false
                }
                ClusterState::Stopping => false,
            }
        };
        if already_standby {
            if let Some(cb) = on_done {
                cb();
            }
            return;
        }
        if let Some(cb) = on_done {
            self.inner.on_standby.lock().push(cb);
        }
        self.logger.info("cluster stopping", serde_json::Value::Null);
        let this = self.clone();
        tokio::spawn(async move { this.drain_and_stop().await });
    }

    async fn drain_and_stop(&self) {
        let ids: Vec<LogicalId> = self.inner.slots.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            let _ = self.stop_worker(&id).await;
        }
        let ports: Vec<u16> = self.inner.balancers.iter().map(|entry| *entry.key()).collect();
        for port in ports {
            if let Some(lb) = self.inner.balancers.get(&port).map(|entry| entry.value().clone()) {
                let this = self.clone();
                lb.stop(Some(Box::new(move || this.spawn_check_fully_stopped())));
            }
        }
        self.check_fully_stopped().await;
    }

    fn spawn_check_fully_stopped(&self) {
        let this = self.clone();
        tokio::spawn(async move { this.check_fully_stopped().await });
    }

    async fn check_fully_stopped(&self) {
        if *self.inner.state.lock() != ClusterState::Stopping {
            return;
        }
        let all_workers_standby = self
            .inner
            .slots
            .iter()
            .all(|entry| entry.value().lock().state() == WorkerState::Standby);
        let all_balancers_standby = self
            .inner
            .balancers
            .iter()
            .all(|entry| entry.value().state() == BalancerState::Standby);
        if !(all_workers_standby && all_balancers_standby) {
            return;
        }
        let callbacks = {
            let mut state = self.inner.state.lock();
            *state = ClusterState::Standby;
            std::mem::take(&mut *self.inner.on_standby.lock())
        };
        if let Some(handle) = self.inner.pulse_handle.lock().take() {
            handle.abort();
        }
        self.logger.info("cluster standby", serde_json::Value::Null);
        for cb in callbacks {
            cb();
        }
    }

    /// Current top-level lifecycle state.
    pub fn state(&self) -> ClusterState {
        *self.inner.state.lock()
    }

    /// A full, event-loop-consistent snapshot of every worker slot and load
    /// balancer (`spec.md` §6).
    pub fn inspect(&self) -> ClusterSupervisorState {
        let workers = self
            .inner
            .slots
            .iter()
            .map(|entry| {
                let slot = entry.value().lock();
                WorkerSnapshot {
                    id: slot.id().clone(),
                    state: slot.state(),
                    starting_at: slot.starting_at(),
                    stop_requested_at: slot.stop_requested_at(),
                    force_stop_at: slot.force_stop_at(),
                    forced_stop: slot.forced_stop(),
                    health: slot.health(),
                    disabled: slot.is_disabled(),
                }
            })
            .collect();
        let balancers = self.inner.balancers.iter().map(|entry| entry.value().inspect()).collect();
        ClusterSupervisorState { workers, balancers }
    }

    /// Total worker slots, regardless of state.
    pub fn count_workers(&self) -> usize {
        self.inner.slots.len()
    }

    /// Worker slots currently `running`.
    pub fn count_running_workers(&self) -> usize {
        self.inspect().count_running_workers()
    }

    /// Worker slots `starting`, `running`, or `stopping`.
    pub fn count_active_workers(&self) -> usize {
        self.inspect().count_active_workers()
    }

    /// Load balancers currently `running`.
    pub fn count_running_load_balancers(&self) -> usize {
        self.inspect().count_running_load_balancers()
    }

    /// Load balancers `starting`, `running`, or `stopping`.
    pub fn count_active_load_balancers(&self) -> usize {
        self.inspect().count_active_load_balancers()
    }
}
