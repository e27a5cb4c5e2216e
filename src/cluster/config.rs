//! Cluster supervisor configuration with a validating builder.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Layer 3: Internal module imports
use crate::backlog::BacklogDropPolicy;
use crate::health::{AlwaysHealthy, HealthPolicy};
use crate::ids::LogicalId;
use crate::worker::WorkerSlot;

use super::error::ConfigError;

/// Default health-pulse interval.
pub const DEFAULT_PULSE: Duration = Duration::from_secs(5);

/// Default grace window between a stop request and forced termination.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(10);

/// Per-slot environment factory, consulted on every worker start
/// (`spec.md` §4.4 responsibility 3).
pub trait EnvironmentFactory: Send + Sync + 'static {
    /// Produce the environment passed to the child for `id`.
    fn environment_for(&self, id: &LogicalId) -> HashMap<String, String>;
}

/// Default factory: an empty environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl EnvironmentFactory for EmptyEnvironment {
    fn environment_for(&self, _id: &LogicalId) -> HashMap<String, String> {
        HashMap::new()
    }
}

impl<F> EnvironmentFactory for F
where
    F: Fn(&LogicalId) -> HashMap<String, String> + Send + Sync + 'static,
{
    fn environment_for(&self, id: &LogicalId) -> HashMap<String, String> {
        self(id)
    }
}

/// Decides whether a worker slot that just reached `standby` should be
/// restarted (`spec.md` §9 open question, resolved in `SPEC_FULL.md` §4.4).
pub trait RestartPolicy: Send + Sync + 'static {
    /// `true` if the slot should be restarted.
    fn should_restart(&self, slot: &WorkerSlot) -> bool;
}

/// Default policy: restart unless the slot has been administratively
/// disabled. The cluster-running precondition is checked by the caller
/// (`ClusterSupervisor`), not by the policy itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRestart;

impl RestartPolicy for AlwaysRestart {
    fn should_restart(&self, slot: &WorkerSlot) -> bool {
        !slot.is_disabled()
    }
}

impl<F> RestartPolicy for F
where
    F: Fn(&WorkerSlot) -> bool + Send + Sync + 'static,
{
    fn should_restart(&self, slot: &WorkerSlot) -> bool {
        self(slot)
    }
}

/// Configuration for a [`super::ClusterSupervisor`] (the "nanny options"
/// table, `spec.md` §6).
#[derive(Clone)]
pub struct NannyConfig {
    /// Path to the worker executable/script.
    pub worker_path: PathBuf,
    /// Argument list passed to each worker.
    pub worker_argv: Vec<String>,
    /// Resolved slot identities. `workerCount` is expanded into
    /// `LogicalId::Index(0..count)` at build time unless `logical_ids` was
    /// supplied explicitly, in which case it wins (`spec.md` §4.4).
    pub logical_ids: Vec<LogicalId>,
    /// Per-slot environment factory.
    pub create_environment: Arc<dyn EnvironmentFactory>,
    /// Health-pulse interval.
    pub pulse: Duration,
    /// Health predicate; `false` requests a graceful stop.
    pub is_healthy: Arc<dyn HealthPolicy>,
    /// Backlog capacity handed to every [`crate::balancer::LoadBalancer`]
    /// this cluster creates. `None` preserves unbounded source behavior.
    pub backlog_cap: Option<usize>,
    /// Backlog drop policy once `backlog_cap` is exceeded.
    pub backlog_drop_policy: BacklogDropPolicy,
    /// Per-worker backlog drain cap on `add_worker` (thundering-herd guard).
    pub drain_batch_per_worker: Option<usize>,
    /// Stop-to-force-kill duration for worker slots.
    pub grace_window: Duration,
    /// Automatic-restart predicate.
    pub restart_policy: Arc<dyn RestartPolicy>,
}

impl std::fmt::Debug for NannyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NannyConfig")
            .field("worker_path", &self.worker_path)
            .field("worker_argv", &self.worker_argv)
            .field("logical_ids", &self.logical_ids)
            .field("pulse", &self.pulse)
            .field("backlog_cap", &self.backlog_cap)
            .field("backlog_drop_policy", &self.backlog_drop_policy)
            .field("drain_batch_per_worker", &self.drain_batch_per_worker)
            .field("grace_window", &self.grace_window)
            .finish_non_exhaustive()
    }
}

impl NannyConfig {
    /// Create a new configuration builder.
    pub fn builder(worker_path: impl Into<PathBuf>) -> NannyConfigBuilder {
        NannyConfigBuilder::new(worker_path)
    }
}

/// Builder for [`NannyConfig`] with a fluent API and end-validation in
/// [`Self::build`].
pub struct NannyConfigBuilder {
    worker_path: PathBuf,
    worker_argv: Vec<String>,
    worker_count: Option<usize>,
    logical_ids: Option<Vec<LogicalId>>,
    create_environment: Option<Arc<dyn EnvironmentFactory>>,
    pulse: Duration,
    is_healthy: Option<Arc<dyn HealthPolicy>>,
    backlog_cap: Option<usize>,
    backlog_drop_policy: BacklogDropPolicy,
    drain_batch_per_worker: Option<usize>,
    grace_window: Duration,
    restart_policy: Option<Arc<dyn RestartPolicy>>,
}

impl NannyConfigBuilder {
    fn new(worker_path: impl Into<PathBuf>) -> Self {
        Self {
            worker_path: worker_path.into(),
            worker_argv: Vec::new(),
            worker_count: None,
            logical_ids: None,
            create_environment: None,
            pulse: DEFAULT_PULSE,
            is_healthy: None,
            backlog_cap: None,
            backlog_drop_policy: BacklogDropPolicy::Oldest,
            drain_batch_per_worker: None,
            grace_window: DEFAULT_GRACE_WINDOW,
            restart_policy: None,
        }
    }

    /// Set the argument list passed to each worker.
    pub fn with_worker_argv(mut self, argv: Vec<String>) -> Self {
        self.worker_argv = argv;
        self
    }

    /// Set the number of slots, numbered `0..count`. Overridden by
    /// [`Self::with_logical_ids`] if both are set.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Set explicit slot identities. Wins over `worker_count` if both are
    /// set (`spec.md` §4.4).
    pub fn with_logical_ids(mut self, ids: Vec<LogicalId>) -> Self {
        self.logical_ids = Some(ids);
        self
    }

    /// Set the per-slot environment factory.
    pub fn with_environment_factory(mut self, factory: impl EnvironmentFactory) -> Self {
        self.create_environment = Some(Arc::new(factory));
        self
    }

    /// Set the health-pulse interval.
    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }

    /// Set the health predicate.
    pub fn with_health_policy(mut self, policy: impl HealthPolicy) -> Self {
        self.is_healthy = Some(Arc::new(policy));
        self
    }

    /// Cap backlog depth and set the drop policy for every load balancer
    /// this cluster creates.
    pub fn with_backlog_cap(mut self, cap: usize, drop_policy: BacklogDropPolicy) -> Self {
        self.backlog_cap = Some(cap);
        self.backlog_drop_policy = drop_policy;
        self
    }

    /// Cap per-worker backlog handoff on `add_worker`.
    pub fn with_drain_batch_per_worker(mut self, max: usize) -> Self {
        self.drain_batch_per_worker = Some(max);
        self
    }

    /// Set the stop-to-force-kill grace window.
    pub fn with_grace_window(mut self, grace: Duration) -> Self {
        self.grace_window = grace;
        self
    }

    /// Set the automatic-restart predicate.
    pub fn with_restart_policy(mut self, policy: impl RestartPolicy) -> Self {
        self.restart_policy = Some(Arc::new(policy));
        self
    }

    /// Resolve `worker_count`/`logical_ids` and validate, producing a
    /// [`NannyConfig`].
    pub fn build(self) -> Result<NannyConfig, ConfigError> {
        let logical_ids = match self.logical_ids {
            Some(ids) if !ids.is_empty() => ids,
            Some(_) | None => match self.worker_count {
                Some(count) if count > 0 => (0..count as u32).map(LogicalId::Index).collect(),
                _ => return Err(ConfigError::InvalidWorkerCount),
            },
        };

        if self.pulse.is_zero() {
            return Err(ConfigError::InvalidPulse);
        }

        Ok(NannyConfig {
            worker_path: self.worker_path,
            worker_argv: self.worker_argv,
            logical_ids,
            create_environment: self
                .create_environment
                .unwrap_or_else(|| Arc::new(EmptyEnvironment)),
            pulse: self.pulse,
            is_healthy: self.is_healthy.unwrap_or_else(|| Arc::new(AlwaysHealthy)),
            backlog_cap: self.backlog_cap,
            backlog_drop_policy: self.backlog_drop_policy,
            drain_batch_per_worker: self.drain_batch_per_worker,
            grace_window: self.grace_window,
            restart_policy: self.restart_policy.unwrap_or_else(|| Arc::new(AlwaysRestart)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_expands_to_indexed_ids() {
        let config = NannyConfig::builder("/usr/bin/worker")
            .with_worker_count(3)
            .build()
            .unwrap();
        assert_eq!(
            config.logical_ids,
            vec![
                LogicalId::from_index(0),
                LogicalId::from_index(1),
                LogicalId::from_index(2),
            ]
        );
    }

    #[test]
    fn logical_ids_win_over_worker_count() {
        let config = NannyConfig::builder("/usr/bin/worker")
            .with_worker_count(5)
            .with_logical_ids(vec![LogicalId::from_name("primary")])
            .build()
            .unwrap();
        assert_eq!(config.logical_ids, vec![LogicalId::from_name("primary")]);
    }

    #[test]
    fn zero_worker_count_and_no_logical_ids_is_invalid() {
        let result = NannyConfig::builder("/usr/bin/worker").build();
        assert!(matches!(result, Err(ConfigError::InvalidWorkerCount)));
    }

    #[test]
    fn zero_pulse_is_invalid() {
        let result = NannyConfig::builder("/usr/bin/worker")
            .with_worker_count(1)
            .with_pulse(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidPulse)));
    }

    #[test]
    fn defaults_are_sensible() {
        let config = NannyConfig::builder("/usr/bin/worker")
            .with_worker_count(1)
            .build()
            .unwrap();
        assert_eq!(config.pulse, DEFAULT_PULSE);
        assert_eq!(config.grace_window, DEFAULT_GRACE_WINDOW);
        assert!(config.backlog_cap.is_none());
    }
}
