//! # Retry decorator: bounded resubscription with race-safe cancellation.
//!
//! [`retry`] wraps any [`Source`] so that a failed execution is transparently
//! resubscribed, up to a fixed bound, replaying all produced values from
//! scratch on each attempt. [`retry_with`] additionally takes a
//! [`RetryPolicy`] carrying an optional backoff delay between attempts.
//!
//! ## Contract
//! - `max_retries == 0` returns the delegate unchanged (same `Arc`, no
//!   wrapping); `max_retries < 0` fails immediately with
//!   [`SessionError::InvalidRetry`], before any scheduling.
//! - On exhaustion, the final failure propagates **unchanged** — there is no
//!   distinct "retries exhausted" error.
//! - Values emitted before a failure are re-emitted in full on the next
//!   attempt. Duplicate delivery across a retry is expected behavior;
//!   callers needing exactly-once delivery must de-duplicate themselves.
//!
//! ## Cancellation protocol
//! The failure callback (which triggers resubscription) and `cancel` run on
//! different threads. The shared state is the atomic counter in
//! [`state`]: cancellation stores a forced-stopped sentinel — distinct from
//! exhaustion — and wakes the driver, which cancels the active inner
//! subscription. A resubscription already in flight re-checks the sentinel
//! immediately after installing its new subscription and, if present,
//! cancels what it just installed — closing the window where a
//! resubscription began just before the sentinel was stored. No blocking
//! lock is involved anywhere on this path.

mod policy;
mod state;

pub use policy::{Backoff, Jitter, RetryPolicy};

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::{SessionError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Outcome, Source, SourceRef, StopSignal, Subscription, TaskUpdate};
use state::{RetryDecision, RetryState};

/// Multicast ring capacity for a retrying subscription's output.
const OUTPUT_BUFFER: usize = 256;

/// Decorates `delegate` so failures resubscribe immediately, up to
/// `max_retries` times.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use seriate::{retry, SourceRef};
/// # fn demo(flaky: SourceRef<u64>) -> Result<(), seriate::SessionError> {
/// let resilient = retry(Arc::clone(&flaky), 3)?;
/// let zero = retry(flaky.clone(), 0)?;
/// assert!(Arc::ptr_eq(&zero, &flaky), "zero bound means no wrapping");
/// # Ok(())
/// # }
/// ```
pub fn retry<T>(delegate: SourceRef<T>, max_retries: i32) -> Result<SourceRef<T>, SessionError>
where
    T: Clone + Send + 'static,
{
    retry_internal(delegate, RetryPolicy::immediate(max_retries), None)
}

/// Decorates `delegate` with the full [`RetryPolicy`] (bound + backoff).
pub fn retry_with<T>(delegate: SourceRef<T>, policy: RetryPolicy) -> Result<SourceRef<T>, SessionError>
where
    T: Clone + Send + 'static,
{
    retry_internal(delegate, policy, None)
}

/// Shared implementation; sessions pass their bus for retry lifecycle events.
pub(crate) fn retry_internal<T>(
    delegate: SourceRef<T>,
    policy: RetryPolicy,
    bus: Option<Bus>,
) -> Result<SourceRef<T>, SessionError>
where
    T: Clone + Send + 'static,
{
    if policy.max_retries < 0 {
        return Err(SessionError::InvalidRetry {
            requested: policy.max_retries,
        });
    }
    if policy.max_retries == 0 {
        return Ok(delegate);
    }
    Ok(Arc::new(Retry {
        delegate,
        policy,
        bus,
    }))
}

/// The decorating source. One subscription chain per `subscribe` call, each
/// with its own [`RetryState`].
struct Retry<T> {
    delegate: SourceRef<T>,
    policy: RetryPolicy,
    bus: Option<Bus>,
}

impl<T: Clone + Send + 'static> Source for Retry<T> {
    type Item = T;

    fn subscribe(&self) -> Subscription<T> {
        let (out, rx) = broadcast::channel(OUTPUT_BUFFER);
        let state = Arc::new(RetryState::new(self.policy.max_retries as u32));
        let driver = Driver {
            delegate: Arc::clone(&self.delegate),
            policy: self.policy,
            bus: self.bus.clone(),
            state: Arc::clone(&state),
            out,
        };
        tokio::spawn(driver.run());
        Subscription::new(Outcome::live(rx), state as Arc<dyn StopSignal>)
    }
}

/// Pumps one subscription chain: forward values, resubscribe on failure,
/// stop on completion, exhaustion, or cancellation.
struct Driver<T> {
    delegate: SourceRef<T>,
    policy: RetryPolicy,
    bus: Option<Bus>,
    state: Arc<RetryState>,
    out: broadcast::Sender<TaskUpdate<T>>,
}

impl<T: Clone + Send + 'static> Driver<T> {
    async fn run(self) {
        let mut attempt: u32 = 1;
        let mut inner = self.delegate.subscribe();
        // The sentinel may have been stored while this first subscription
        // was being installed.
        if self.state.is_force_stopped() {
            inner.cancel();
            self.finish_canceled(attempt);
            return;
        }
        loop {
            let failure = loop {
                tokio::select! {
                    _ = self.state.cancelled() => {
                        inner.cancel();
                        self.finish_canceled(attempt);
                        return;
                    }
                    next = inner.next() => match next {
                        Some(Ok(value)) => {
                            let _ = self.out.send(TaskUpdate::Value(value));
                        }
                        Some(Err(e)) => break e,
                        None => {
                            let _ = self.out.send(TaskUpdate::Completed);
                            return;
                        }
                    },
                }
            };

            match self.state.try_consume() {
                RetryDecision::ForceStopped => {
                    inner.cancel();
                    self.finish_canceled(attempt);
                    return;
                }
                RetryDecision::Exhausted => {
                    self.publish(
                        Event::new(EventKind::RetryExhausted)
                            .with_attempt(attempt)
                            .with_reason(failure.to_string()),
                    );
                    // The final failure propagates unchanged.
                    let _ = self.out.send(TaskUpdate::Failed(failure));
                    return;
                }
                RetryDecision::Retry => {
                    let mut scheduled = Event::new(EventKind::RetryScheduled)
                        .with_attempt(attempt)
                        .with_reason(failure.to_string());
                    if let Some(backoff) = self.policy.backoff {
                        let delay = backoff.delay(attempt);
                        scheduled = scheduled.with_delay(delay);
                        self.publish(scheduled);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.state.cancelled() => {
                                self.finish_canceled(attempt);
                                return;
                            }
                        }
                    } else {
                        self.publish(scheduled);
                    }

                    attempt += 1;
                    inner = self.delegate.subscribe();
                    // Install-then-recheck: cancel the subscription we just
                    // installed if the sentinel landed while we subscribed.
                    if self.state.is_force_stopped() {
                        inner.cancel();
                        self.finish_canceled(attempt);
                        return;
                    }
                }
            }
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    fn finish_canceled(&self, attempt: u32) {
        self.publish(Event::new(EventKind::RetryCanceled).with_attempt(attempt));
        let _ = self.out.send(TaskUpdate::Failed(TaskError::Canceled));
    }
}
