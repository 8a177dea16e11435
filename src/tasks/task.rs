//! # Task abstraction and function-backed task implementation.
//!
//! This module defines the [`Task`] trait and a convenient function-backed
//! implementation [`TaskFn`]. The common handle type is [`TaskRef`], an
//! `Arc<dyn Task>` suitable for sharing across the runtime (cold/share
//! scheduling and retry both re-run the *same* task value).
//!
//! A task is a **blocking** unit of work against `&mut H`, the session's
//! native handle. It runs on the worker thread — the one place the handle may
//! be touched — and emits zero or more values through a [`Sink`] before
//! returning completion or an error. Long-running tasks should poll
//! [`Sink::is_cancelled`] and exit promptly.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::sink::Sink;

/// A unit of work confined to the worker thread.
///
/// `run` receives exclusive access to the native handle and a sink for the
/// values it produces. The task is stateless with respect to the worker: the
/// same task value may be run many times (shared cold scheduling re-uses one
/// execution, retry re-runs from scratch), so per-execution state belongs in
/// local variables, not in `self`.
///
/// # Example
/// ```
/// use seriate::{Sink, Task, TaskError};
///
/// struct FetchPending;
///
/// impl Task<Vec<String>> for FetchPending {
///     type Item = String;
///
///     fn name(&self) -> &str { "fetch-pending" }
///
///     fn run(&self, handle: &mut Vec<String>, sink: &mut Sink<String>) -> Result<(), TaskError> {
///         for entry in handle.drain(..) {
///             if sink.is_cancelled() {
///                 return Err(TaskError::Canceled);
///             }
///             sink.emit(entry);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Task<H>: Send + Sync + 'static {
    /// The value type this task produces. `Clone` because results are
    /// multicast to every subscriber of the outcome.
    type Item: Clone + Send + 'static;

    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task against the confined handle.
    ///
    /// Implementations should check `sink.is_cancelled()` at natural
    /// boundaries and return [`TaskError::Canceled`] to honor cancellation.
    fn run(&self, handle: &mut H, sink: &mut Sink<Self::Item>) -> Result<(), TaskError>;
}

/// Shared handle to a task producing `T` against handle type `H`.
pub type TaskRef<H, T> = Arc<dyn Task<H, Item = T>>;

/// Function-backed task implementation.
///
/// Wraps a closure invoked once per execution. Each run starts from the
/// closure's captured environment; use `Arc<...>` inside the closure for
/// state that must survive across retries.
pub struct TaskFn<T, F> {
    name: Cow<'static, str>,
    f: F,
    _out: PhantomData<fn() -> T>,
}

impl<T, F> TaskFn<T, F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _out: PhantomData,
        }
    }

    /// Creates the task and returns it as a shared handle.
    ///
    /// ## Example
    /// ```
    /// use seriate::{TaskFn, TaskRef, TaskError};
    ///
    /// let t: TaskRef<u32, u32> = TaskFn::arc("read", |handle: &mut u32, sink| {
    ///     sink.emit(*handle);
    ///     Ok(())
    /// });
    /// assert_eq!(t.name(), "read");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<H, T, F> Task<H> for TaskFn<T, F>
where
    T: Clone + Send + 'static,
    F: Fn(&mut H, &mut Sink<T>) -> Result<(), TaskError> + Send + Sync + 'static,
{
    type Item = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, handle: &mut H, sink: &mut Sink<T>) -> Result<(), TaskError> {
        (self.f)(handle, sink)
    }
}
