//! The session worker: one dedicated thread, one FIFO queue, one native handle.
//!
//! Internal modules:
//! - [`worker`]: the [`SessionWorker`] itself — thread confinement, hot/cold
//!   scheduling, blocking `submit`;
//! - [`hooks`]: FIFO pre-shutdown hook registry;
//! - [`shutdown`]: the idempotent shutdown driver (hooks → close → retire).

mod hooks;
mod shutdown;
mod worker;

pub use worker::{Cold, Hot, SessionWorker, WorkerSource, WorkerState};
