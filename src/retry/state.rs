//! # The atomic retry state machine.
//!
//! One [`RetryState`] exists per retrying subscription chain, shared between
//! the application thread (which may cancel at any time) and the retry
//! driver (which consumes the counter on each failure). The whole protocol
//! is a single atomic:
//!
//! ```text
//! remaining > 0      ── try_consume (CAS −1) ──►  Retry
//! remaining = 0      ── try_consume ──────────►  Exhausted
//! FORCE_STOPPED      ── try_consume ──────────►  ForceStopped
//!
//! any state          ── force_stop ───────────►  FORCE_STOPPED (terminal)
//! ```
//!
//! `FORCE_STOPPED` is a sentinel distinct from exhaustion: exhaustion
//! propagates the last failure, a forced stop is a cancellation. The
//! sentinel is set **synchronously** in `force_stop`, so a resubscription
//! racing the cancel observes it when it records its new subscription and
//! cancels what it just installed.
//!
//! No blocking lock guards this state; the counter is the only shared word,
//! and the cancellation token carries the wakeup.

use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use tokio_util::sync::CancellationToken;

use crate::tasks::StopSignal;

/// Sentinel for "cancelled by the caller", distinct from 0 ("exhausted").
const FORCE_STOPPED: i64 = i64::MIN;

/// What a failed attempt should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Budget remained; it has been consumed — resubscribe.
    Retry,
    /// Budget is exhausted — propagate the failure unchanged.
    Exhausted,
    /// The chain was cancelled — stop without propagating anything new.
    ForceStopped,
}

/// Shared state of one retrying subscription chain.
pub(crate) struct RetryState {
    remaining: AtomicI64,
    token: CancellationToken,
}

impl RetryState {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self {
            remaining: AtomicI64::new(i64::from(max_retries)),
            token: CancellationToken::new(),
        }
    }

    /// Consumes one retry from the budget, if any remains.
    pub(crate) fn try_consume(&self) -> RetryDecision {
        let mut current = self.remaining.load(AtomicOrdering::SeqCst);
        loop {
            if current == FORCE_STOPPED {
                return RetryDecision::ForceStopped;
            }
            if current == 0 {
                return RetryDecision::Exhausted;
            }
            match self.remaining.compare_exchange_weak(
                current,
                current - 1,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => return RetryDecision::Retry,
                Err(actual) => current = actual,
            }
        }
    }

    /// Marks the chain cancelled and wakes the driver. Idempotent; wins over
    /// any remaining budget, including one consumed concurrently.
    pub(crate) fn force_stop(&self) {
        self.remaining.store(FORCE_STOPPED, AtomicOrdering::SeqCst);
        self.token.cancel();
    }

    pub(crate) fn is_force_stopped(&self) -> bool {
        self.remaining.load(AtomicOrdering::SeqCst) == FORCE_STOPPED
    }

    /// Completes once the chain has been cancelled.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl StopSignal for RetryState {
    fn stop(&self) {
        self.force_stop();
    }
    fn is_stopped(&self) -> bool {
        self.is_force_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_budget_counts_down_to_exhausted() {
        let state = RetryState::new(2);
        assert_eq!(state.try_consume(), RetryDecision::Retry);
        assert_eq!(state.try_consume(), RetryDecision::Retry);
        assert_eq!(state.try_consume(), RetryDecision::Exhausted);
        assert_eq!(state.try_consume(), RetryDecision::Exhausted);
    }

    #[test]
    fn test_zero_budget_is_exhausted_not_stopped() {
        let state = RetryState::new(0);
        assert_eq!(state.try_consume(), RetryDecision::Exhausted);
        assert!(!state.is_force_stopped(), "exhausted is not cancelled");
    }

    #[test]
    fn test_force_stop_wins_over_remaining_budget() {
        let state = RetryState::new(5);
        state.force_stop();
        assert_eq!(state.try_consume(), RetryDecision::ForceStopped);
        assert!(state.is_force_stopped());
        // Idempotent.
        state.force_stop();
        assert_eq!(state.try_consume(), RetryDecision::ForceStopped);
    }

    #[test]
    fn test_concurrent_consumers_never_exceed_budget() {
        let state = Arc::new(RetryState::new(100));
        let mut joins = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            joins.push(std::thread::spawn(move || {
                let mut won = 0u32;
                while state.try_consume() == RetryDecision::Retry {
                    won += 1;
                }
                won
            }));
        }
        let total: u32 = joins.into_iter().map(|j| j.join().unwrap()).sum();
        assert_eq!(total, 100, "exactly the budget must be consumable");
    }

    #[tokio::test]
    async fn test_force_stop_wakes_waiters() {
        let state = Arc::new(RetryState::new(3));
        let waiter = Arc::clone(&state);
        let waited = tokio::spawn(async move { waiter.cancelled().await });
        state.force_stop();
        tokio::time::timeout(std::time::Duration::from_secs(1), waited)
            .await
            .expect("cancelled() must complete after force_stop")
            .expect("waiter task succeeds");
    }
}
