//! Subscriber API: hook into session/worker lifecycle events.
//!
//! - [`subscriber`]: the [`Subscribe`] trait implemented by consumers;
//! - [`set`]: [`SubscriberSet`] — panic-isolated fan-out with per-subscriber
//!   queues;
//! - [`log`]: a stdout [`LogWriter`] for demos (feature `logging`).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use seriate::{Event, Subscribe};
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     fn name(&self) -> &'static str { "metrics" }
//!     async fn on_event(&self, _ev: &Event) {
//!         // count things...
//!     }
//! }
//! ```

mod set;
mod subscriber;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
