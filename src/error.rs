//! Error types used by sessions, workers, and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`SessionError`] — errors raised by the session/worker machinery itself.
//! - [`TaskError`] — errors raised by individual task executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`TaskError`] is `Clone` because terminal updates are multicast to every
//! subscriber of an outcome, and a cached shutdown result is replayed to every
//! caller of `shutdown`.

use std::time::Duration;
use thiserror::Error;

use crate::session::Ordering;

/// # Errors produced by task execution.
///
/// These surface **only** through the result stream of the task that produced
/// them; a failing task never affects its worker's queue or its neighbours.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled before or during execution.
    #[error("cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Failed`] from any displayable error.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        TaskError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seriate::TaskError;
    ///
    /// let err = TaskError::failed("connection refused");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Failed { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Failed { error } => format!("error: {error}"),
            TaskError::Canceled => "cancelled".to_string(),
        }
    }
}

/// # Errors produced by the session/worker machinery.
///
/// These are either synchronously-detectable contract violations
/// ([`SessionError::Stopped`], [`SessionError::UnsupportedOrdering`],
/// [`SessionError::InvalidRetry`]) or lifecycle failures reported through the
/// shutdown result ([`SessionError::ShutdownTimeout`], [`SessionError::Close`]).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Submission attempted after shutdown began. Fail-fast: nothing was queued.
    #[error("session worker is stopped; submission refused")]
    Stopped,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {error}")]
    Spawn {
        /// The underlying OS error message.
        error: String,
    },

    /// The connection failed to open a native session handle.
    #[error("failed to open session handle: {error}")]
    Connect {
        /// The underlying connection error message.
        error: String,
    },

    /// The requested ordering level exceeds what the connection offers.
    ///
    /// Raised synchronously at session creation; a connection may silently
    /// serve a *stronger* level than requested, never a weaker one.
    #[error("requested {requested} ordering, but the connection offers at most {strongest}")]
    UnsupportedOrdering {
        /// The ordering level the caller asked for.
        requested: Ordering,
        /// The strongest level the connection can provide.
        strongest: Ordering,
    },

    /// A negative retry bound was passed to `retry`.
    #[error("invalid retry bound {requested}; must be >= 0")]
    InvalidRetry {
        /// The rejected bound.
        requested: i32,
    },

    /// The close task did not finish within the shutdown timeout.
    ///
    /// The worker thread is retired (detached) regardless; the native close
    /// keeps running on it in the background, best-effort.
    #[error("shutdown timeout {grace:?} exceeded; worker thread detached")]
    ShutdownTimeout {
        /// The timeout that was exceeded.
        grace: Duration,
    },

    /// The native close operation failed. Thread retirement is not blocked.
    #[error("native close failed: {error}")]
    Close {
        /// The underlying close error message.
        error: String,
    },

    /// A task-level failure propagated through a session-level call
    /// (`submit`, `commit`, `rollback`).
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seriate::SessionError;
    ///
    /// assert_eq!(SessionError::Stopped.as_label(), "session_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Stopped => "session_stopped",
            SessionError::Spawn { .. } => "worker_spawn_failed",
            SessionError::Connect { .. } => "connect_failed",
            SessionError::UnsupportedOrdering { .. } => "unsupported_ordering",
            SessionError::InvalidRetry { .. } => "invalid_retry",
            SessionError::ShutdownTimeout { .. } => "shutdown_timeout",
            SessionError::Close { .. } => "close_failed",
            SessionError::Task(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::Stopped => "worker stopped; submission refused".to_string(),
            SessionError::Spawn { error } => format!("worker spawn failed: {error}"),
            SessionError::Connect { error } => format!("connect failed: {error}"),
            SessionError::UnsupportedOrdering {
                requested,
                strongest,
            } => format!("requested {requested}, connection offers at most {strongest}"),
            SessionError::InvalidRetry { requested } => {
                format!("retry bound {requested} is negative")
            }
            SessionError::ShutdownTimeout { grace } => {
                format!("close task exceeded {grace:?}")
            }
            SessionError::Close { error } => format!("close failed: {error}"),
            SessionError::Task(e) => e.as_message(),
        }
    }
}
