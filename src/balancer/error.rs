//! Errors surfaced by [`super::LoadBalancer`] operations.
//!
//! Most LB transitions are intentionally infallible (idempotent no-ops per
//! `spec.md` §4.3); `BalancerError` exists for the one case that is not a
//! recoverable condition at all: an `ERROR`/`CLOSE` event observed while in
//! `standby`, which `spec.md` §7.3 calls an invariant violation that "MUST
//! abort".

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Errors from [`super::LoadBalancer`].
#[derive(Debug, Error)]
pub enum BalancerError {
    /// `ERROR` or `CLOSE` was observed while the balancer was in `standby`.
    ///
    /// This indicates an OS-layer bug or a ring-buffering defect upstream
    /// of the balancer (`spec.md` §7, kind 3) and is never expected in
    /// correct operation; `nanny-core` surfaces it as an error rather than
    /// panicking so embedding applications can decide how to fail.
    #[error("invariant violation: {reason} observed while balancer was in standby")]
    InvariantViolation { reason: &'static str },
}
