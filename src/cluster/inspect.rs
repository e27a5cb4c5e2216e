//! The inspection snapshot surface (`spec.md` §6): `ClusterSupervisorState`.

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal module imports
use crate::balancer::BalancerSnapshot;
use crate::health::HealthReport;
use crate::ids::LogicalId;
use crate::worker::WorkerState;

/// A snapshot of one worker slot, captured on the event loop.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub id: LogicalId,
    pub state: WorkerState,
    pub starting_at: Option<DateTime<Utc>>,
    pub stop_requested_at: Option<DateTime<Utc>>,
    pub force_stop_at: Option<DateTime<Utc>>,
    pub forced_stop: bool,
    pub health: Option<HealthReport>,
    pub disabled: bool,
}

/// A full snapshot of a [`super::ClusterSupervisor`], returned by value
/// (`spec.md` §6: "captured on the event loop, returned by value").
#[derive(Debug, Clone, Serialize, Default)]
pub struct ClusterSupervisorState {
    pub workers: Vec<WorkerSnapshot>,
    pub balancers: Vec<BalancerSnapshot>,
}

impl ClusterSupervisorState {
    /// Number of worker slots, regardless of state.
    pub fn count_workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of worker slots currently `running`.
    pub fn count_running_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.state == WorkerState::Running).count()
    }

    /// Number of worker slots `starting`, `running`, or `stopping`.
    pub fn count_active_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state != WorkerState::Standby)
            .count()
    }

    /// Number of load balancers currently `running`.
    pub fn count_running_load_balancers(&self) -> usize {
        self.balancers
            .iter()
            .filter(|b| b.state == crate::balancer::BalancerState::Running)
            .count()
    }

    /// Number of load balancers `starting`, `running`, or `stopping`.
    pub fn count_active_load_balancers(&self) -> usize {
        self.balancers
            .iter()
            .filter(|b| b.state != crate::balancer::BalancerState::Standby)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::BalancerState;

    fn worker(state: WorkerState) -> WorkerSnapshot {
        WorkerSnapshot {
            id: LogicalId::from_index(0),
            state,
            starting_at: None,
            stop_requested_at: None,
            force_stop_at: None,
            forced_stop: false,
            health: None,
            disabled: false,
        }
    }

    fn balancer(state: BalancerState) -> BalancerSnapshot {
        BalancerSnapshot {
            state,
            port: 8080,
            address: None,
            backlog_size: 0,
        }
    }

    #[test]
    fn counts_partition_by_state() {
        let snapshot = ClusterSupervisorState {
            workers: vec![
                worker(WorkerState::Running),
                worker(WorkerState::Starting),
                worker(WorkerState::Standby),
            ],
            balancers: vec![balancer(BalancerState::Running), balancer(BalancerState::Standby)],
        };
        assert_eq!(snapshot.count_workers(), 3);
        assert_eq!(snapshot.count_running_workers(), 1);
        assert_eq!(snapshot.count_active_workers(), 2);
        assert_eq!(snapshot.count_running_load_balancers(), 1);
        assert_eq!(snapshot.count_active_load_balancers(), 1);
    }
}
