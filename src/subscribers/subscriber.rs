//! # The `Subscribe` trait.
//!
//! Implement [`Subscribe`] to observe lifecycle [`Event`]s: logging, metrics,
//! alerting, resource cleanup tracking. Subscribers are registered at session
//! start and receive events through a dedicated bounded queue each, so a slow
//! subscriber never blocks the worker or its peers (see
//! [`SubscriberSet`](crate::SubscriberSet)).

use async_trait::async_trait;

use crate::events::Event;

/// An asynchronous observer of lifecycle events.
///
/// ### Delivery contract
/// - Events arrive in per-subscriber FIFO order.
/// - Delivery is best-effort: if this subscriber's queue is full, the event is
///   dropped for this subscriber only and a `SubscriberOverflow` event is
///   published.
/// - A panic inside [`on_event`](Subscribe::on_event) is caught and reported;
///   it does not crash the runtime or affect other subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Returns a stable, human-readable subscriber name (used in health events).
    fn name(&self) -> &'static str;

    /// Handles one event. Must not assume any cross-subscriber ordering.
    async fn on_event(&self, event: &Event);

    /// Capacity of this subscriber's delivery queue (minimum 1 enforced).
    fn queue_capacity(&self) -> usize {
        128
    }
}
