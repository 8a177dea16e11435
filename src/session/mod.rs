//! Sessions: the ordering contract and the per-session facade.
//!
//! - [`ordering`]: the three-level [`Ordering`] contract;
//! - [`connection`]: the [`Connection`] factory and [`SessionHandle`] traits;
//! - [`session`]: [`Session`] — one worker, one negotiated ordering level,
//!   scheduling plus commit/rollback plus close.

mod connection;
mod ordering;
mod session;

pub use connection::{Connection, SessionHandle};
pub use ordering::Ordering;
pub use session::Session;

pub(crate) use connection::negotiate;
