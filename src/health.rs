//! Health reporting and the pure health predicate.

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// A worker's self-reported memory usage, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Resident set size.
    pub rss: u64,
    /// Total heap reserved.
    pub heap_total: u64,
    /// Heap actually in use.
    pub heap_used: u64,
}

/// A health report produced by a worker once per pulse window.
///
/// `load` is the number of milliseconds the worker was busy over the last
/// pulse window (`spec.md` §3). `HealthReport` carries no timestamp of its
/// own; the cluster supervisor timestamps its arrival with its [`crate::clock::Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Memory usage at report time.
    pub memory_usage: MemoryUsage,
    /// Milliseconds busy over the last pulse window.
    pub load_ms: u64,
}

/// Pure predicate deciding whether a worker is still healthy.
///
/// Implementations MUST NOT perform I/O or block (`spec.md` §4.5); the
/// cluster supervisor calls this at most once per worker per pulse tick
/// (P8).
pub trait HealthPolicy: Send + Sync + 'static {
    /// Evaluate a report. `false` requests a graceful stop of the worker.
    fn is_healthy(&self, report: &HealthReport) -> bool;
}

/// Default policy: every report is healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

impl HealthPolicy for AlwaysHealthy {
    fn is_healthy(&self, _report: &HealthReport) -> bool {
        true
    }
}

impl<F> HealthPolicy for F
where
    F: Fn(&HealthReport) -> bool + Send + Sync + 'static,
{
    fn is_healthy(&self, report: &HealthReport) -> bool {
        self(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(load_ms: u64) -> HealthReport {
        HealthReport {
            memory_usage: MemoryUsage {
                rss: 1,
                heap_total: 2,
                heap_used: 1,
            },
            load_ms,
        }
    }

    #[test]
    fn always_healthy_accepts_anything() {
        assert!(AlwaysHealthy.is_healthy(&report(u64::MAX)));
    }

    #[test]
    fn closures_implement_health_policy() {
        let policy = |r: &HealthReport| r.load_ms < 1000;
        assert!(policy.is_healthy(&report(10)));
        assert!(!policy.is_healthy(&report(5000)));
    }
}
