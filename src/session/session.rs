//! # Session: one negotiated ordering level over one confined worker.
//!
//! A [`Session`] is the application-facing facade: it negotiates the
//! ordering level with a [`Connection`], opens the native handle, binds a
//! [`SessionWorker`] to it, and exposes scheduling, transaction control, and
//! shutdown. Every read/write scheduled through the session executes on the
//! worker thread in strict submission order.
//!
//! ## Control flow
//! ```text
//! Session::start(conn, requested, cfg)
//!   ├─► negotiate(conn, requested)      → effective Ordering (or error)
//!   ├─► conn.open(effective)            → native handle
//!   ├─► SessionWorker::spawn(handle)    → dedicated thread + FIFO queue
//!   └─► publish SessionStarted
//!
//! session.schedule_hot / schedule_cold / source / submit  → worker queue
//! session.commit / rollback                               → worker queue
//! session.close(timeout)   → hooks → handle.close() → thread retired
//! ```
//!
//! ## Commit/rollback semantics
//! Meaningful only on [`Ordering::Transactional`] sessions, where they cover
//! every task executed on the worker since the previous commit/rollback (or
//! session start). On weaker sessions they are accepted no-ops that succeed
//! immediately, so callers need not special-case the ordering level.
//! Failures surface through the returned result like any other operation;
//! neither implies an automatic retry or automatic rollback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{Bus, Event, EventKind};
use crate::retry::{retry_internal, RetryPolicy};
use crate::session::connection::{Connection, SessionHandle};
use crate::session::ordering::Ordering;
use crate::session::negotiate;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{SourceRef, TaskRef};
use crate::worker::{Cold, Hot, SessionWorker, WorkerSource, WorkerState};

/// One middleware session: a negotiated [`Ordering`] level and the dedicated
/// worker that serializes all I/O against the session's native handle.
pub struct Session<C: Connection> {
    name: Arc<str>,
    ordering: Ordering,
    worker: SessionWorker<C::Handle>,
    bus: Bus,
    grace: Duration,
    /// Keeps subscriber workers alive for the session's lifetime.
    _subscribers: Option<Arc<SubscriberSet>>,
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("ordering", &self.ordering)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Session<C> {
    /// Starts a session without event subscribers.
    ///
    /// See [`start_with_subscribers`](Session::start_with_subscribers).
    pub fn start(
        name: impl Into<Arc<str>>,
        connection: &C,
        requested: Ordering,
        cfg: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::start_with_subscribers(name, connection, requested, cfg, Vec::new())
    }

    /// Negotiates the ordering level, opens the native handle, and spawns
    /// the session's worker.
    ///
    /// The connection may silently serve a level **stronger** than
    /// `requested`; if it cannot satisfy the request at all, this fails with
    /// [`SessionError::UnsupportedOrdering`] and nothing is opened. Each
    /// start request negotiates independently.
    ///
    /// Must be called from within a tokio runtime when `subscribers` is
    /// non-empty (subscriber workers are spawned onto it).
    pub fn start_with_subscribers(
        name: impl Into<Arc<str>>,
        connection: &C,
        requested: Ordering,
        cfg: SessionConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, SessionError> {
        let ordering = negotiate(connection, requested)?;
        let handle = connection.open(ordering)?;

        let bus = Bus::new(cfg.bus_capacity);
        let subscribers = if subscribers.is_empty() {
            None
        } else {
            let set = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
            let listener_set = Arc::clone(&set);
            let mut rx = bus.subscribe();
            tokio::spawn(async move {
                while let Ok(ev) = rx.recv().await {
                    listener_set.emit(&ev);
                }
            });
            Some(set)
        };

        let name: Arc<str> = name.into();
        let worker = SessionWorker::spawn(Arc::clone(&name), handle, &cfg, bus.clone())?;
        bus.publish(
            Event::new(EventKind::SessionStarted)
                .with_worker(Arc::clone(&name))
                .with_ordering(ordering),
        );

        Ok(Self {
            name,
            ordering,
            worker,
            bus,
            grace: cfg.grace,
            _subscribers: subscribers,
        })
    }

    /// Returns the session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordering level this session actually provides (requested
    /// or silently upgraded).
    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Returns the lifecycle state (Started / Stopping / Stopped).
    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Returns the underlying worker, for callers composing their own
    /// scheduling on top of the session.
    pub fn worker(&self) -> &SessionWorker<C::Handle> {
        &self.worker
    }

    /// Returns a fresh receiver of this session's lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Schedules `task` eagerly. See [`SessionWorker::schedule_hot`].
    pub fn schedule_hot<T>(&self, task: TaskRef<C::Handle, T>) -> Result<Hot<T>, SessionError>
    where
        T: Clone + Send + 'static,
    {
        self.worker.schedule_hot(task)
    }

    /// Schedules `task` lazily and shareably. See [`SessionWorker::schedule_cold`].
    pub fn schedule_cold<T>(&self, task: TaskRef<C::Handle, T>) -> Cold<C::Handle, T>
    where
        T: Clone + Send + 'static,
    {
        self.worker.schedule_cold(task)
    }

    /// Returns a lazy-per-subscriber source over `task`. See [`SessionWorker::source`].
    pub fn source<T>(&self, task: TaskRef<C::Handle, T>) -> WorkerSource<C::Handle, T>
    where
        T: Clone + Send + 'static,
    {
        self.worker.source(task)
    }

    /// Returns a retrying source over `task`: each subscription executes on
    /// this session's worker, and failures resubscribe per `policy`, with
    /// retry lifecycle events published to this session's bus.
    pub fn retry_source<T>(
        &self,
        task: TaskRef<C::Handle, T>,
        policy: RetryPolicy,
    ) -> Result<SourceRef<T>, SessionError>
    where
        T: Clone + Send + 'static,
    {
        let source: SourceRef<T> = Arc::new(self.worker.source(task));
        retry_internal(source, policy, Some(self.bus.clone()))
    }

    /// Runs a blocking closure against the native handle on the worker
    /// thread. See [`SessionWorker::submit`].
    pub async fn submit<R, F>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut C::Handle) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.worker.submit(f).await
    }

    /// Registers a pre-shutdown hook. See [`SessionWorker::add_pre_shutdown_hook`].
    pub fn add_pre_shutdown_hook<F>(&self, hook: F) -> Result<(), SessionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.worker.add_pre_shutdown_hook(hook)
    }

    /// Commits every unit of work since the previous commit/rollback.
    ///
    /// On a non-transactional session this is an accepted no-op succeeding
    /// immediately, without touching the worker queue.
    pub async fn commit(&self) -> Result<(), SessionError> {
        if self.ordering != Ordering::Transactional {
            return Ok(());
        }
        self.worker.submit(|h: &mut C::Handle| h.commit()).await??;
        self.bus
            .publish(Event::new(EventKind::Committed).with_worker(Arc::clone(&self.name)));
        Ok(())
    }

    /// Rolls back every unit of work since the previous commit/rollback.
    ///
    /// Same no-op contract as [`commit`](Session::commit) on
    /// non-transactional sessions.
    pub async fn rollback(&self) -> Result<(), SessionError> {
        if self.ordering != Ordering::Transactional {
            return Ok(());
        }
        self.worker
            .submit(|h: &mut C::Handle| h.rollback())
            .await??;
        self.bus
            .publish(Event::new(EventKind::RolledBack).with_worker(Arc::clone(&self.name)));
        Ok(())
    }

    /// Closes the session with the configured grace period.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.close_within(self.grace).await
    }

    /// Closes the session: refuses new submissions, drains queued work, runs
    /// pre-shutdown hooks, closes the native handle, retires the worker
    /// thread. Idempotent — see [`SessionWorker::shutdown`].
    pub async fn close_within(&self, timeout: Duration) -> Result<(), SessionError> {
        self.worker
            .shutdown(|h: &mut C::Handle| h.close(), timeout)
            .await
    }
}
