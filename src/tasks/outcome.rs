//! # The asynchronous consumer side of a task's result stream.
//!
//! - [`TaskUpdate`]: the multicast wire value (crate-internal);
//! - [`Outcome`]: pull-based async receiver — next-value, completion, error;
//! - [`Subscription`]: an [`Outcome`] paired with an idempotent, any-thread
//!   [`cancel`](Subscription::cancel);
//! - [`Canceller`]: a detached, cloneable cancel handle, so one thread can
//!   await values while another holds the ability to cancel.
//!
//! ## Terminal semantics
//! An outcome yields values until a terminal update: completion ends the
//! stream (`next` returns `None`), a failure is yielded once as `Some(Err)`
//! and the stream ends after it. A subscriber attaching *after* the terminal
//! resolves immediately from the recorded terminal instead of hanging.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::TaskError;

/// One update on a task's multicast result stream.
#[derive(Clone, Debug)]
pub(crate) enum TaskUpdate<T> {
    /// A value the task emitted.
    Value(T),
    /// The task completed normally; no further updates follow.
    Completed,
    /// The task failed; no further updates follow.
    Failed(TaskError),
}

/// Internal cancel protocol behind [`Subscription`] and [`Canceller`].
///
/// Implemented by the worker's multicast core (plain token cancel) and by the
/// retry state machine (sentinel + token cancel).
pub(crate) trait StopSignal: Send + Sync {
    /// Requests cancellation. Idempotent, safe from any thread at any time.
    fn stop(&self);
    /// Returns `true` once cancellation has been requested.
    fn is_stopped(&self) -> bool;
}

impl StopSignal for tokio_util::sync::CancellationToken {
    fn stop(&self) {
        self.cancel();
    }
    fn is_stopped(&self) -> bool {
        self.is_cancelled()
    }
}

enum OutcomeInner<T> {
    /// Attached to a live execution.
    Live(broadcast::Receiver<TaskUpdate<T>>),
    /// Terminal already known; `Some` failure is yielded once.
    Finished(Option<TaskError>),
}

/// Pull-based asynchronous view of one task execution's output.
///
/// Obtained by subscribing to a scheduled task (or a [`Source`]); multiple
/// outcomes over the same execution each see the full value stream from
/// their subscription point onward ("share" semantics — late subscribers do
/// not replay missed values).
pub struct Outcome<T> {
    inner: OutcomeInner<T>,
}

impl<T: Clone + Send + 'static> Outcome<T> {
    pub(crate) fn live(rx: broadcast::Receiver<TaskUpdate<T>>) -> Self {
        Self {
            inner: OutcomeInner::Live(rx),
        }
    }

    pub(crate) fn finished(err: Option<TaskError>) -> Self {
        Self {
            inner: OutcomeInner::Finished(err),
        }
    }

    /// Waits for the next value.
    ///
    /// Returns `Some(Ok(value))` per emitted value, `Some(Err(e))` exactly
    /// once if the execution failed, and `None` once the stream has ended.
    /// A lag gap (this subscriber fell behind the multicast ring) skips the
    /// lost values and continues with the next available update.
    pub async fn next(&mut self) -> Option<Result<T, TaskError>> {
        loop {
            let update = match &mut self.inner {
                OutcomeInner::Finished(err) => return err.take().map(Err),
                OutcomeInner::Live(rx) => match rx.recv().await {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            };
            match update {
                TaskUpdate::Value(v) => return Some(Ok(v)),
                TaskUpdate::Completed => {
                    self.inner = OutcomeInner::Finished(None);
                    return None;
                }
                TaskUpdate::Failed(e) => {
                    self.inner = OutcomeInner::Finished(None);
                    return Some(Err(e));
                }
            }
        }
    }

    /// Drains the stream, discarding values, and returns the terminal result.
    pub async fn completion(&mut self) -> Result<(), TaskError> {
        while let Some(res) = self.next().await {
            res?;
        }
        Ok(())
    }

    /// Collects every remaining value, or the failure that ended the stream.
    pub async fn collect(&mut self) -> Result<Vec<T>, TaskError> {
        let mut values = Vec::new();
        while let Some(res) = self.next().await {
            values.push(res?);
        }
        Ok(values)
    }
}

/// An [`Outcome`] paired with the ability to cancel the work behind it.
///
/// Cancellation is idempotent and safe from any thread; use
/// [`canceller`](Subscription::canceller) to hand the cancel capability to
/// another thread while this one keeps pulling values.
pub struct Subscription<T> {
    outcome: Outcome<T>,
    stop: Arc<dyn StopSignal>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub(crate) fn new(outcome: Outcome<T>, stop: Arc<dyn StopSignal>) -> Self {
        Self { outcome, stop }
    }

    /// Waits for the next value. See [`Outcome::next`].
    pub async fn next(&mut self) -> Option<Result<T, TaskError>> {
        self.outcome.next().await
    }

    /// Drains the stream and returns the terminal result. See [`Outcome::completion`].
    pub async fn completion(&mut self) -> Result<(), TaskError> {
        self.outcome.completion().await
    }

    /// Collects every remaining value. See [`Outcome::collect`].
    pub async fn collect(&mut self) -> Result<Vec<T>, TaskError> {
        self.outcome.collect().await
    }

    /// Requests cancellation of the underlying work. Idempotent.
    ///
    /// An execution already queued on the worker cannot be unspliced from the
    /// FIFO; it observes its token and finishes as [`TaskError::Canceled`]
    /// without touching the native handle.
    pub fn cancel(&self) {
        self.stop.stop();
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Returns a detached cancel handle sharing this subscription's signal.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            stop: Arc::clone(&self.stop),
        }
    }
}

/// Detached, cloneable cancel handle for a [`Subscription`].
#[derive(Clone)]
pub struct Canceller {
    stop: Arc<dyn StopSignal>,
}

impl Canceller {
    /// Requests cancellation. Idempotent, safe from any thread at any time.
    pub fn cancel(&self) {
        self.stop.stop();
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.stop.is_stopped()
    }
}
