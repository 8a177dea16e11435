//! # Resubscribable producers.
//!
//! A [`Source`] is an operation that starts a **fresh** execution on every
//! [`subscribe`](Source::subscribe) — the lazy-per-subscriber counterpart to
//! shared cold scheduling, and the seam the retry decorator wraps: retrying
//! is nothing more than subscribing again.

use std::sync::Arc;

use crate::tasks::outcome::Subscription;

/// A producer that can be subscribed to repeatedly.
///
/// Each call to `subscribe` starts an independent execution with its own
/// result stream and cancellation. Values already emitted by one execution
/// are not visible to another; a resubscribed execution replays its output
/// from scratch.
///
/// Must be called from within a tokio runtime context when the source drives
/// work through asynchronous machinery (worker sources and retry decorators
/// both do).
pub trait Source: Send + Sync + 'static {
    /// The value type produced per execution.
    type Item: Clone + Send + 'static;

    /// Starts a fresh execution and returns its subscription.
    ///
    /// Never blocks and never fails synchronously: if the execution cannot
    /// be started (for example the session worker has stopped), the failure
    /// is delivered through the subscription's terminal instead.
    fn subscribe(&self) -> Subscription<Self::Item>;
}

impl<T> std::fmt::Debug for dyn Source<Item = T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Source")
    }
}

/// Shared, type-erased handle to a [`Source`] of `T`.
pub type SourceRef<T> = Arc<dyn Source<Item = T>>;
