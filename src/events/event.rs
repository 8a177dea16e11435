//! # Runtime events emitted by workers, sessions, and retry chains.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task lifecycle**: execution flow on a worker (starting, stopped, failed)
//! - **Retry lifecycle**: resubscription scheduling and termination
//! - **Session lifecycle**: start, commit/rollback, shutdown progress
//! - **Subscriber health**: fan-out overflow and panic isolation
//!
//! The [`Event`] struct carries optional metadata: worker and task names,
//! reasons, attempt numbers, delays, and the negotiated ordering level.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order across subscribers.
//!
//! ## Example
//! ```rust
//! use seriate::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_worker("orders")
//!     .with_task("publish")
//!     .with_reason("broker unavailable")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("publish"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::session::Ordering;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle events ===
    /// A task is starting on the worker thread.
    ///
    /// Sets: `worker`, `task`, `at`, `seq`.
    TaskStarting,

    /// A task finished: completed normally **or** exited on cancellation.
    ///
    /// Sets: `worker`, `task`, `at`, `seq`.
    TaskStopped,

    /// A task failed. The failure surfaces only on that task's outcome.
    ///
    /// Sets: `worker`, `task`, `reason`, `at`, `seq`.
    TaskFailed,

    /// A submission was refused because shutdown had begun.
    ///
    /// Sets: `worker`, `at`, `seq`.
    SubmitRejected,

    // === Retry lifecycle events ===
    /// A failed attempt will be resubscribed.
    ///
    /// Sets: `attempt` (the attempt that failed, 1-based), `reason`,
    /// `delay_ms` (when a backoff applies), `at`, `seq`.
    RetryScheduled,

    /// The retry bound is exhausted; the last failure propagates unchanged.
    ///
    /// Sets: `attempt` (total attempts made), `reason`, `at`, `seq`.
    RetryExhausted,

    /// The retry chain was cancelled by the caller.
    ///
    /// Sets: `attempt` (attempts made so far), `at`, `seq`.
    RetryCanceled,

    // === Session lifecycle events ===
    /// A session started with its negotiated ordering level.
    ///
    /// Sets: `worker` (session name), `ordering`, `at`, `seq`.
    SessionStarted,

    /// A transactional commit completed on the worker.
    ///
    /// Sets: `worker`, `at`, `seq`.
    Committed,

    /// A transactional rollback completed on the worker.
    ///
    /// Sets: `worker`, `at`, `seq`.
    RolledBack,

    /// Shutdown began: new submissions are refused from this point.
    ///
    /// Sets: `worker`, `at`, `seq`.
    ShutdownRequested,

    /// All pre-shutdown hooks have run, in registration order.
    ///
    /// Sets: `worker`, `at`, `seq`.
    HooksFinished,

    /// The native close operation failed during shutdown.
    ///
    /// Sets: `worker`, `reason`, `at`, `seq`.
    CloseFailed,

    /// The worker thread retired. Terminal event for a worker.
    ///
    /// Sets: `worker`, `at`, `seq`.
    WorkerStopped,

    // === Subscriber health events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `task` (subscriber name), `reason`, `at`, `seq`.
    SubscriberPanicked,

    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`, `at`, `seq`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the worker/session, if applicable.
    pub worker: Option<Arc<str>>,
    /// Name of the task (or subscriber, for health events), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1) for retry events.
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Negotiated ordering level for session events.
    pub ordering: Option<Ordering>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            task: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            ordering: None,
        }
    }

    /// Attaches a worker/session name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the negotiated ordering level.
    #[inline]
    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
