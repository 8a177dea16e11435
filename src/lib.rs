//! # seriate
//!
//! **Seriate** confines all I/O against one middleware session to one
//! dedicated worker thread, giving the session deterministic ordering and
//! transactional semantics behind a fully asynchronous interface — plus a
//! retry decorator that resubscribes failed producers while staying safely
//! cancellable across threads.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐      ┌───────────────────────────────────────────┐
//!     │  Connection  │─────►│ Session (negotiated Ordering level)       │
//!     │ (middleware) │ open │  - SessionWorker (dedicated thread, FIFO) │
//!     └──────────────┘      │  - Bus (lifecycle events)                 │
//!                           │  - commit / rollback / close              │
//!                           └──────┬──────────────────┬─────────────────┘
//!                                  ▼                  ▼
//!                        schedule_hot/cold        submit(closure)
//!                                  │                  │
//!                                  ▼                  ▼
//!              ┌───────────────────────────────────────────────┐
//!              │ worker thread:  job ── job ── job ── close    │
//!              │ (submission order == execution order)         │
//!              └──────┬────────────────────────────────────────┘
//!                     ▼
//!              Outcome / Subscription  ◄── multicast updates
//!                     ▲
//!                     │ subscribe() per attempt
//!              ┌──────┴───────┐
//!              │ retry(source)│  failure → consume budget → resubscribe
//!              └──────────────┘  cancel  → sentinel + token, race-safe
//! ```
//!
//! ### Lifecycle
//! ```text
//! Session::start ──► negotiate ordering ──► open handle ──► spawn worker
//!
//! loop (worker thread) {
//!   ├─► next directive (FIFO)
//!   ├─► Run(job)   → task.run(&mut handle, sink) → outcome terminal
//!   └─► Close      → hooks (FIFO) → handle.close() → break
//! }
//!
//! On close: submissions refused → queued work drains → hooks → native
//! close → thread retired; outcome cached for every later caller.
//! ```
//!
//! ## Features
//! | Area            | Description                                                       | Key types / traits                          |
//! |-----------------|-------------------------------------------------------------------|---------------------------------------------|
//! | **Sessions**    | Ordering negotiation, commit/rollback, graceful close.            | [`Session`], [`Connection`], [`Ordering`]   |
//! | **Worker**      | Thread confinement, hot/cold scheduling, blocking submit, hooks.  | [`SessionWorker`], [`Hot`], [`Cold`]        |
//! | **Tasks**       | Blocking units emitting value streams consumed asynchronously.    | [`Task`], [`TaskFn`], [`Sink`], [`Outcome`] |
//! | **Retry**       | Bounded resubscription, race-safe cancel, optional backoff.       | [`retry`], [`RetryPolicy`], [`Backoff`]     |
//! | **Subscribers** | Panic-isolated lifecycle event fan-out.                           | [`Subscribe`], [`SubscriberSet`], [`Event`] |
//! | **Errors**      | Typed, two-tier error taxonomy.                                   | [`SessionError`], [`TaskError`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use seriate::{
//!     Connection, Ordering, Session, SessionConfig, SessionError, SessionHandle, Sink,
//!     TaskError, TaskFn,
//! };
//!
//! // A toy middleware: the "native handle" is just a queue of strings.
//! struct Broker;
//!
//! struct BrokerSession {
//!     inbox: Vec<String>,
//! }
//!
//! impl SessionHandle for BrokerSession {
//!     fn close(&mut self) -> Result<(), TaskError> {
//!         Ok(())
//!     }
//! }
//!
//! impl Connection for Broker {
//!     type Handle = BrokerSession;
//!     fn offers(&self, level: Ordering) -> bool {
//!         level <= Ordering::Ordered
//!     }
//!     fn open(&self, _level: Ordering) -> Result<BrokerSession, SessionError> {
//!         Ok(BrokerSession { inbox: vec!["hello".into()] })
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session =
//!         Session::start("demo", &Broker, Ordering::Unordered, SessionConfig::default())?;
//!     // The connection only does Ordered, so the request was silently upgraded.
//!     assert_eq!(session.ordering(), Ordering::Ordered);
//!
//!     // Lazy, shareable read: nothing runs until the first subscription.
//!     let read = TaskFn::arc("drain", |h: &mut BrokerSession, sink: &mut Sink<String>| {
//!         for msg in h.inbox.drain(..) {
//!             sink.emit(msg);
//!         }
//!         Ok(())
//!     });
//!     let cold = session.schedule_cold(read);
//!     let mut sub = cold.subscribe();
//!     assert_eq!(sub.collect().await?, vec!["hello".to_string()]);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod retry;
mod session;
mod subscribers;
mod tasks;
mod worker;

// ---- Public re-exports ----

pub use config::SessionConfig;
pub use error::{SessionError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use retry::{retry, retry_with, Backoff, Jitter, RetryPolicy};
pub use session::{Connection, Ordering, Session, SessionHandle};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Canceller, Outcome, Sink, Source, SourceRef, Subscription, Task, TaskFn, TaskRef};
pub use worker::{Cold, Hot, SessionWorker, WorkerSource, WorkerState};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
