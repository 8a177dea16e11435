//! # The value sink handed to a running task.
//!
//! [`Sink`] is the producer side of a task's result stream. A task emits
//! values through it while running on the worker thread; subscribers consume
//! them asynchronously through [`Outcome`](crate::Outcome).
//!
//! Emission never blocks: values are multicast through a bounded broadcast
//! ring, and a subscriber that falls behind observes a lag gap rather than
//! exerting backpressure on the worker thread (the worker drains tasks as
//! fast as they are submitted).

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::tasks::outcome::TaskUpdate;

/// Producer-side handle for a task's result stream.
///
/// ### Properties
/// - `emit` never blocks and never fails; with no live subscriber the value
///   is dropped (hot scheduling executes regardless of observation).
/// - `is_cancelled` reflects a cancel from any subscriber/canceller thread;
///   checking it is cooperative, not mandatory, but long tasks should.
pub struct Sink<T> {
    tx: broadcast::Sender<TaskUpdate<T>>,
    token: CancellationToken,
}

impl<T: Clone + Send + 'static> Sink<T> {
    pub(crate) fn new(tx: broadcast::Sender<TaskUpdate<T>>, token: CancellationToken) -> Self {
        Self { tx, token }
    }

    /// Emits one value to all current subscribers.
    pub fn emit(&mut self, value: T) {
        let _ = self.tx.send(TaskUpdate::Value(value));
    }

    /// Returns `true` once the execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
