//! # SessionWorker: thread-confined, strictly serialized task execution.
//!
//! Owns one dedicated OS thread per session and serializes every operation
//! against the session's native handle onto it. The handle is moved into the
//! thread at spawn and never leaves: tasks, blocking submits, transaction
//! control, and the final close all run there, in strict submission order.
//!
//! ## Architecture
//! ```text
//! application threads (many)                worker thread (exactly one)
//!   schedule_hot(task) ──┐
//!   schedule_cold(task) ─┼── Directive ──► [FIFO queue] ──► blocking_recv loop
//!   submit(closure) ─────┤   (unbounded           │
//!   shutdown(close) ─────┘    mpsc)               ▼
//!                                          job(&mut handle)
//!                                                 │
//!         Outcome / oneshot  ◄── multicast ───────┘
//! ```
//!
//! ## Rules
//! - **FIFO equals execution order**: the queue is the sole ordering
//!   authority; this equivalence is what lets a session claim "ordered"
//!   semantics.
//! - **No overlap**: one thread drains the queue; no two tasks from the same
//!   worker ever run concurrently.
//! - **Failures are private**: a task failure surfaces only on its own
//!   outcome and never halts the queue; only shutdown does.
//! - **Fail-fast after stop**: once shutdown begins, submissions return
//!   [`SessionError::Stopped`] instead of queuing or blocking.
//!
//! ## Hot vs cold
//! [`schedule_hot`](SessionWorker::schedule_hot) enqueues at call time and
//! executes whether or not anyone subscribes; later subscribers share the
//! multicast stream from their attach point. [`schedule_cold`](SessionWorker::schedule_cold)
//! enqueues on first subscription and shares the single execution between
//! all subscribers. [`source`](SessionWorker::source) is lazy per subscriber:
//! every subscription is a fresh, independent execution (the retry seam).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{SessionError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Outcome, Sink, Source, StopSignal, Subscription, TaskRef, TaskUpdate};
use crate::worker::hooks::{HookRegistry, PreShutdownHook};

pub(super) const STARTED: u8 = 0;
pub(super) const STOPPING: u8 = 1;
pub(super) const STOPPED: u8 = 2;

/// Observable lifecycle state of a worker (and thus its session).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Accepting submissions.
    Started,
    /// Shutdown in progress: submissions refused, queue draining.
    Stopping,
    /// Thread retired; outcome cached.
    Stopped,
}

/// A queued unit of work, executed with exclusive access to the handle.
pub(super) type Job<H> = Box<dyn FnOnce(&mut H) + Send + 'static>;

/// What flows through the worker queue.
pub(super) enum Directive<H> {
    /// Ordinary work.
    Run(Job<H>),
    /// Terminal directive: run hooks, close the handle, break the loop.
    Close {
        hooks: Vec<PreShutdownHook>,
        close: Box<dyn FnOnce(&mut H) -> Result<(), TaskError> + Send + 'static>,
        done: oneshot::Sender<Result<(), TaskError>>,
    },
}

pub(super) struct Shared<H> {
    pub(super) name: Arc<str>,
    pub(super) tx: mpsc::UnboundedSender<Directive<H>>,
    pub(super) state: AtomicU8,
    pub(super) hooks: HookRegistry,
    pub(super) bus: Bus,
    /// Cached shutdown outcome; `None` until the driver publishes it.
    pub(super) outcome: watch::Sender<Option<Result<(), SessionError>>>,
    pub(super) task_buffer: usize,
}

/// Serializes all I/O for one session onto one dedicated thread.
///
/// Cheap to clone; all clones share the same thread, queue, and state.
pub struct SessionWorker<H> {
    pub(super) shared: Arc<Shared<H>>,
}

impl<H> Clone for SessionWorker<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: Send + 'static> SessionWorker<H> {
    /// Spawns the worker thread and moves `handle` into it.
    ///
    /// The thread is named `"<cfg.thread_prefix>-<name>"` and lives until
    /// [`shutdown`](SessionWorker::shutdown) retires it.
    pub fn spawn(
        name: impl Into<Arc<str>>,
        handle: H,
        cfg: &SessionConfig,
        bus: Bus,
    ) -> Result<Self, SessionError> {
        let name: Arc<str> = name.into();
        let (tx, rx) = mpsc::unbounded_channel::<Directive<H>>();
        let (outcome_tx, _outcome_rx) = watch::channel(None);

        let thread_name = format!("{}-{}", cfg.thread_prefix, name);
        let loop_bus = bus.clone();
        let loop_name = Arc::clone(&name);
        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_loop(handle, rx, loop_bus, loop_name))
            .map_err(|e| SessionError::Spawn {
                error: e.to_string(),
            })?;

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                tx,
                state: AtomicU8::new(STARTED),
                hooks: HookRegistry::new(),
                bus,
                outcome: outcome_tx,
                task_buffer: cfg.task_buffer,
            }),
        })
    }

    /// Returns the worker name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> WorkerState {
        match self.shared.state.load(AtomicOrdering::SeqCst) {
            STARTED => WorkerState::Started,
            STOPPING => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }

    /// Schedules `task` eagerly: it executes whether or not the returned
    /// handle is ever subscribed.
    ///
    /// The returned [`Hot`] multicasts the execution's output; a subscriber
    /// attaching mid-stream sees only subsequent values.
    pub fn schedule_hot<T>(&self, task: TaskRef<H, T>) -> Result<Hot<T>, SessionError>
    where
        T: Clone + Send + 'static,
    {
        let core = Arc::new(MulticastCore::new(self.shared.task_buffer, true));
        self.enqueue(task, Arc::clone(&core))?;
        Ok(Hot { core })
    }

    /// Schedules `task` lazily: nothing is enqueued until the first
    /// subscription, and all subscribers share that single execution.
    ///
    /// The task is never re-run for later subscribers; they join the
    /// multicast stream (and a subscriber attaching after the terminal
    /// resolves immediately from the recorded terminal).
    pub fn schedule_cold<T>(&self, task: TaskRef<H, T>) -> Cold<H, T>
    where
        T: Clone + Send + 'static,
    {
        Cold {
            worker: self.clone(),
            task,
            core: Arc::new(MulticastCore::new(self.shared.task_buffer, false)),
        }
    }

    /// Returns a lazy-per-subscriber [`Source`]: every subscription starts a
    /// fresh, independent execution of `task`.
    pub fn source<T>(&self, task: TaskRef<H, T>) -> WorkerSource<H, T>
    where
        T: Clone + Send + 'static,
    {
        WorkerSource {
            worker: self.clone(),
            task,
        }
    }

    /// Runs an arbitrary blocking closure on the worker thread, for
    /// operations on a native handle that is not itself thread-safe.
    ///
    /// The closure runs in FIFO position like any task; the result comes
    /// back asynchronously. Awaiting a `submit` therefore also acts as a
    /// barrier for everything enqueued before it.
    pub async fn submit<R, F>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut H) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.ensure_started()?;
        let (tx, rx) = oneshot::channel::<R>();
        let job: Job<H> = Box::new(move |handle| {
            let _ = tx.send(f(handle));
        });
        self.shared
            .tx
            .send(Directive::Run(job))
            .map_err(|_| SessionError::Stopped)?;
        // A dropped sender means the job was discarded behind a close
        // directive that raced this submission.
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Registers a hook to run during shutdown, in FIFO registration order,
    /// after submissions are refused and before the native close.
    pub fn add_pre_shutdown_hook<F>(&self, hook: F) -> Result<(), SessionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_started()?;
        self.shared.hooks.push(Box::new(hook));
        Ok(())
    }

    pub(super) fn ensure_started(&self) -> Result<(), SessionError> {
        if self.shared.state.load(AtomicOrdering::SeqCst) == STARTED {
            Ok(())
        } else {
            self.shared.bus.publish(
                Event::new(EventKind::SubmitRejected).with_worker(Arc::clone(&self.shared.name)),
            );
            Err(SessionError::Stopped)
        }
    }

    /// Wraps `task` in a job that routes its output into `core` and enqueues it.
    pub(crate) fn enqueue<T>(
        &self,
        task: TaskRef<H, T>,
        core: Arc<MulticastCore<T>>,
    ) -> Result<(), SessionError>
    where
        T: Clone + Send + 'static,
    {
        self.ensure_started()?;
        let bus = self.shared.bus.clone();
        let worker_name = Arc::clone(&self.shared.name);
        let guard = CompletionGuard {
            core,
            finished: false,
        };
        let job: Job<H> = Box::new(move |handle| {
            let mut guard = guard;
            let task_name: Arc<str> = Arc::from(task.name());
            if guard.core.token().is_cancelled() {
                // Cancelled while queued: hold the FIFO slot, skip the handle.
                bus.publish(
                    Event::new(EventKind::TaskStopped)
                        .with_worker(Arc::clone(&worker_name))
                        .with_task(task_name),
                );
                guard.finish(Some(TaskError::Canceled));
                return;
            }
            bus.publish(
                Event::new(EventKind::TaskStarting)
                    .with_worker(Arc::clone(&worker_name))
                    .with_task(Arc::clone(&task_name)),
            );
            let mut sink = guard.core.sink();
            match task.run(handle, &mut sink) {
                Ok(()) => {
                    bus.publish(
                        Event::new(EventKind::TaskStopped)
                            .with_worker(worker_name)
                            .with_task(task_name),
                    );
                    guard.finish(None);
                }
                // Cancellation is a graceful exit, not a failure.
                Err(TaskError::Canceled) => {
                    bus.publish(
                        Event::new(EventKind::TaskStopped)
                            .with_worker(worker_name)
                            .with_task(task_name),
                    );
                    guard.finish(Some(TaskError::Canceled));
                }
                Err(e) => {
                    bus.publish(
                        Event::new(EventKind::TaskFailed)
                            .with_worker(worker_name)
                            .with_task(task_name)
                            .with_reason(e.to_string()),
                    );
                    guard.finish(Some(e));
                }
            }
        });
        self.shared
            .tx
            .send(Directive::Run(job))
            .map_err(|_| SessionError::Stopped)
    }
}

/// The worker thread body: drain directives until the close directive.
fn run_loop<H>(
    mut handle: H,
    mut rx: mpsc::UnboundedReceiver<Directive<H>>,
    bus: Bus,
    name: Arc<str>,
) {
    while let Some(directive) = rx.blocking_recv() {
        match directive {
            Directive::Run(job) => job(&mut handle),
            Directive::Close { hooks, close, done } => {
                for hook in hooks {
                    hook();
                }
                bus.publish(Event::new(EventKind::HooksFinished).with_worker(Arc::clone(&name)));
                let res = close(&mut handle);
                let _ = done.send(res);
                break;
            }
        }
    }
    // Jobs still queued behind the close directive are dropped here; their
    // completion guards resolve each outcome as Canceled.
    drop(rx);
    drop(handle);
    bus.publish(Event::new(EventKind::WorkerStopped).with_worker(name));
}

/// Shared multicast state for one execution: output ring, cancellation
/// token, lazy-start flag, and the recorded terminal.
pub(crate) struct MulticastCore<T> {
    tx: broadcast::Sender<TaskUpdate<T>>,
    token: CancellationToken,
    started: AtomicBool,
    terminal: OnceLock<Option<TaskError>>,
}

impl<T: Clone + Send + 'static> MulticastCore<T> {
    pub(crate) fn new(buffer: usize, started: bool) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            token: CancellationToken::new(),
            started: AtomicBool::new(started),
            terminal: OnceLock::new(),
        }
    }

    /// Attaches a subscriber. Must be called *before* any start that should
    /// be observed from its first value.
    pub(crate) fn subscribe(&self) -> Outcome<T> {
        let rx = self.tx.subscribe();
        // The terminal is recorded before the terminal update is sent, so
        // either the receiver predates the update or the record is visible.
        match self.terminal.get() {
            Some(terminal) => Outcome::finished(terminal.clone()),
            None => Outcome::live(rx),
        }
    }

    pub(crate) fn sink(&self) -> Sink<T> {
        Sink::new(self.tx.clone(), self.token.clone())
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` exactly once, for the caller that triggers the start.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, AtomicOrdering::SeqCst)
    }

    /// Records and multicasts the terminal. `None` is completion.
    pub(crate) fn finish(&self, err: Option<TaskError>) {
        let _ = self.terminal.set(err.clone());
        let update = match err {
            None => TaskUpdate::Completed,
            Some(e) => TaskUpdate::Failed(e),
        };
        let _ = self.tx.send(update);
    }
}

impl<T: Clone + Send + 'static> StopSignal for MulticastCore<T> {
    fn stop(&self) {
        self.token.cancel();
    }
    fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Resolves the outcome as `Canceled` if the job is dropped unexecuted
/// (discarded behind a close directive) or panics mid-run.
struct CompletionGuard<T: Clone + Send + 'static> {
    core: Arc<MulticastCore<T>>,
    finished: bool,
}

impl<T: Clone + Send + 'static> CompletionGuard<T> {
    fn finish(&mut self, err: Option<TaskError>) {
        self.finished = true;
        self.core.finish(err);
    }
}

impl<T: Clone + Send + 'static> Drop for CompletionGuard<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.core.finish(Some(TaskError::Canceled));
        }
    }
}

/// Handle to an eagerly-scheduled execution. Clone to share.
pub struct Hot<T> {
    core: Arc<MulticastCore<T>>,
}

impl<T> Clone for Hot<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + 'static> Hot<T> {
    /// Joins the multicast stream from this point onward.
    pub fn subscribe(&self) -> Subscription<T> {
        let outcome = self.core.subscribe();
        Subscription::new(outcome, Arc::clone(&self.core) as Arc<dyn StopSignal>)
    }
}

/// Handle to a lazily-scheduled, shareable execution. Clone to share.
pub struct Cold<H, T> {
    worker: SessionWorker<H>,
    task: TaskRef<H, T>,
    core: Arc<MulticastCore<T>>,
}

impl<H, T> Clone for Cold<H, T> {
    fn clone(&self) -> Self {
        Self {
            worker: self.worker.clone(),
            task: Arc::clone(&self.task),
            core: Arc::clone(&self.core),
        }
    }
}

impl<H: Send + 'static, T: Clone + Send + 'static> Cold<H, T> {
    /// Subscribes, enqueuing the task if this is the first subscription.
    ///
    /// If the worker has already stopped, the refusal is delivered through
    /// the subscription's terminal rather than thrown here.
    pub fn subscribe(&self) -> Subscription<T> {
        let outcome = self.core.subscribe();
        if self.core.mark_started() {
            if let Err(err) = self.worker.enqueue(Arc::clone(&self.task), Arc::clone(&self.core)) {
                self.core.finish(Some(TaskError::failed(err)));
            }
        }
        Subscription::new(outcome, Arc::clone(&self.core) as Arc<dyn StopSignal>)
    }
}

/// Lazy-per-subscriber [`Source`] over a worker and a task: each
/// subscription is a fresh, independent execution.
pub struct WorkerSource<H, T> {
    worker: SessionWorker<H>,
    task: TaskRef<H, T>,
}

impl<H, T> Clone for WorkerSource<H, T> {
    fn clone(&self) -> Self {
        Self {
            worker: self.worker.clone(),
            task: Arc::clone(&self.task),
        }
    }
}

impl<H: Send + 'static, T: Clone + Send + 'static> Source for WorkerSource<H, T> {
    type Item = T;

    fn subscribe(&self) -> Subscription<T> {
        let core = Arc::new(MulticastCore::new(self.worker.shared.task_buffer, true));
        let outcome = core.subscribe();
        if let Err(err) = self.worker.enqueue(Arc::clone(&self.task), Arc::clone(&core)) {
            core.finish(Some(TaskError::failed(err)));
        }
        Subscription::new(outcome, core as Arc<dyn StopSignal>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_worker() -> SessionWorker<Vec<String>> {
        let cfg = SessionConfig::default();
        SessionWorker::spawn("test", Vec::new(), &cfg, Bus::new(cfg.bus_capacity))
            .expect("worker spawns")
    }

    /// Blocks the worker thread until the returned sender is dropped.
    ///
    /// Enqueued synchronously, so everything scheduled afterwards sits
    /// behind the gate in FIFO order.
    fn gate(worker: &SessionWorker<Vec<String>>) -> std::sync::mpsc::Sender<()> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let job: Job<Vec<String>> = Box::new(move |_h| {
            let _ = rx.recv();
        });
        worker
            .shared
            .tx
            .send(Directive::Run(job))
            .expect("worker alive");
        tx
    }

    #[tokio::test]
    async fn test_submit_runs_on_named_worker_thread() {
        let worker = test_worker();
        let thread_name = worker
            .submit(|_h| std::thread::current().name().map(str::to_owned))
            .await
            .expect("submit succeeds")
            .expect("worker thread is named");
        assert_eq!(thread_name, "seriate-test");
    }

    #[tokio::test]
    async fn test_submission_order_equals_execution_order() {
        let worker = test_worker();
        for i in 0..50 {
            let _ = worker.submit(move |h| h.push(i.to_string())).await;
        }
        let seen = worker.submit(|h| h.clone()).await.expect("read back");
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tasks_never_overlap() {
        let worker = test_worker();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut submitters = Vec::new();
        for _ in 0..4 {
            let worker = worker.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            submitters.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let in_flight = Arc::clone(&in_flight);
                    let max_seen = Arc::clone(&max_seen);
                    worker
                        .submit(move |_h| {
                            let now = in_flight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                            max_seen.fetch_max(now, AtomicOrdering::SeqCst);
                            std::thread::sleep(Duration::from_micros(200));
                            in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
                        })
                        .await
                        .expect("submit succeeds");
                }
            }));
        }
        for s in submitters {
            s.await.expect("submitter finishes");
        }
        assert_eq!(
            max_seen.load(AtomicOrdering::SeqCst),
            1,
            "two tasks from one worker ran concurrently"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_per_submitter_fifo_order() {
        let cfg = SessionConfig::default();
        let worker: SessionWorker<Vec<(usize, usize)>> =
            SessionWorker::spawn("fifo", Vec::new(), &cfg, Bus::new(8)).expect("worker spawns");

        let mut submitters = Vec::new();
        for submitter in 0..3 {
            let worker = worker.clone();
            submitters.push(tokio::spawn(async move {
                for i in 0..20 {
                    worker
                        .submit(move |h| h.push((submitter, i)))
                        .await
                        .expect("submit succeeds");
                }
            }));
        }
        for s in submitters {
            s.await.expect("submitter finishes");
        }

        let log = worker.submit(|h| h.clone()).await.expect("read back");
        for submitter in 0..3 {
            let seq: Vec<usize> = log
                .iter()
                .filter(|(s, _)| *s == submitter)
                .map(|(_, i)| *i)
                .collect();
            let expected: Vec<usize> = (0..20).collect();
            assert_eq!(seq, expected, "submitter {submitter} order violated");
        }
    }

    #[tokio::test]
    async fn test_hot_executes_without_subscription() {
        let worker = test_worker();
        let task = TaskFn::arc("mark", |h: &mut Vec<String>, _sink: &mut Sink<u32>| {
            h.push("ran".into());
            Ok(())
        });
        let _hot = worker.schedule_hot(task).expect("scheduled");
        // submit is a FIFO barrier: the hot task ran before it.
        let log = worker.submit(|h| h.clone()).await.expect("read back");
        assert_eq!(log, vec!["ran".to_string()]);
    }

    #[tokio::test]
    async fn test_hot_multicasts_to_subscribers() {
        let worker = test_worker();
        let release = gate(&worker);
        let task = TaskFn::arc("emit", |_h: &mut Vec<String>, sink: &mut Sink<u32>| {
            for v in [1, 2, 3] {
                sink.emit(v);
            }
            Ok(())
        });
        let hot = worker.schedule_hot(task).expect("scheduled");
        let mut a = hot.subscribe();
        let mut b = hot.subscribe();
        drop(release);

        assert_eq!(a.collect().await, Ok(vec![1, 2, 3]));
        assert_eq!(b.collect().await, Ok(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_cold_is_lazy_and_shared() {
        let worker = test_worker();
        let runs = Arc::new(AtomicUsize::new(0));
        let task = {
            let runs = Arc::clone(&runs);
            TaskFn::arc("cold", move |_h: &mut Vec<String>, sink: &mut Sink<u32>| {
                runs.fetch_add(1, AtomicOrdering::SeqCst);
                sink.emit(42);
                Ok(())
            })
        };
        let cold = worker.schedule_cold(task);

        // Nothing runs before the first subscription.
        worker.submit(|_h| ()).await.expect("barrier");
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 0);

        let release = gate(&worker);
        let mut a = cold.subscribe();
        let mut b = cold.clone().subscribe();
        drop(release);

        assert_eq!(a.collect().await, Ok(vec![42]));
        assert_eq!(b.collect().await, Ok(vec![42]));
        assert_eq!(
            runs.load(AtomicOrdering::SeqCst),
            1,
            "shared cold execution must run exactly once"
        );
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal_resolves_immediately() {
        let worker = test_worker();
        let task = TaskFn::arc("quick", |_h: &mut Vec<String>, sink: &mut Sink<u32>| {
            sink.emit(7);
            Ok(())
        });
        let hot = worker.schedule_hot(task).expect("scheduled");
        worker.submit(|_h| ()).await.expect("barrier");

        let mut late = hot.subscribe();
        // Values are gone (share semantics), but the terminal is recorded.
        assert_eq!(late.collect().await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_failure_surfaces_only_on_its_outcome() {
        let worker = test_worker();
        let failing = TaskFn::arc("bad", |_h: &mut Vec<String>, _sink: &mut Sink<u32>| {
            Err(TaskError::failed("broker unavailable"))
        });
        let hot = worker.schedule_hot(failing).expect("scheduled");
        let mut sub = hot.subscribe();

        assert_eq!(
            sub.completion().await,
            Err(TaskError::failed("broker unavailable"))
        );
        // The queue keeps draining after a task failure.
        let still_alive = worker.submit(|_h| "ok").await.expect("queue not halted");
        assert_eq!(still_alive, "ok");
    }

    #[tokio::test]
    async fn test_source_runs_fresh_execution_per_subscribe() {
        let worker = test_worker();
        let runs = Arc::new(AtomicUsize::new(0));
        let task = {
            let runs = Arc::clone(&runs);
            TaskFn::arc("fresh", move |_h: &mut Vec<String>, sink: &mut Sink<u32>| {
                let n = runs.fetch_add(1, AtomicOrdering::SeqCst) as u32;
                sink.emit(n);
                Ok(())
            })
        };
        let source = worker.source(task);
        let mut first = source.subscribe();
        assert_eq!(first.collect().await, Ok(vec![0]));
        let mut second = source.subscribe();
        assert_eq!(second.collect().await, Ok(vec![1]));
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_run_skips_handle() {
        let worker = test_worker();
        let release = gate(&worker);
        let task = TaskFn::arc("skip", |h: &mut Vec<String>, _sink: &mut Sink<u32>| {
            h.push("touched".into());
            Ok(())
        });
        let hot = worker.schedule_hot(task).expect("scheduled");
        let sub = hot.subscribe();
        sub.cancel();
        drop(release);

        let mut sub = sub;
        assert_eq!(sub.completion().await, Err(TaskError::Canceled));
        let log = worker.submit(|h| h.clone()).await.expect("read back");
        assert!(log.is_empty(), "cancelled task must not touch the handle");
    }

    #[tokio::test]
    async fn test_sink_observes_cancellation_mid_run() {
        let worker = test_worker();
        let cancelled_seen = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&cancelled_seen);
        let pair = Arc::new((Mutex::new(false), std::sync::Condvar::new()));
        let in_task = Arc::clone(&pair);

        let task = TaskFn::arc("loop", move |_h: &mut Vec<String>, sink: &mut Sink<u32>| {
            // Signal the test that the task is running, then wait out the cancel.
            {
                let (lock, cvar) = &*in_task;
                *lock.lock().unwrap() = true;
                cvar.notify_all();
            }
            while !sink.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            observed.fetch_add(1, AtomicOrdering::SeqCst);
            Err(TaskError::Canceled)
        });
        let hot = worker.schedule_hot(task).expect("scheduled");
        let mut sub = hot.subscribe();

        // Wait until the task body is live on the worker thread.
        let (lock, cvar) = &*pair;
        {
            let mut started = lock.lock().unwrap();
            while !*started {
                started = cvar.wait(started).unwrap();
            }
        }
        sub.cancel();
        assert_eq!(sub.completion().await, Err(TaskError::Canceled));
        assert_eq!(cancelled_seen.load(AtomicOrdering::SeqCst), 1);
    }
}
