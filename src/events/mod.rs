//! Lifecycle events published by sessions, workers, and the retry decorator.
//!
//! - [`event`]: the [`Event`] value and its [`EventKind`] classification;
//! - [`bus`]: the broadcast [`Bus`] carrying events to subscribers.
//!
//! Events are observability only: no component waits on event delivery, and
//! dropping every receiver changes nothing about execution.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
