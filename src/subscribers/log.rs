//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [session-started] session=orders ordering=transactional
//! [starting] worker=orders task=publish
//! [failed] worker=orders task=publish err="broker unavailable"
//! [retry] attempt=1 delay=250ms err="broker unavailable"
//! [shutdown-requested] worker=orders
//! [hooks-finished] worker=orders
//! [worker-stopped] worker=orders
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::TaskStarting => {
                println!("[starting] worker={:?} task={:?}", e.worker, e.task);
            }
            EventKind::TaskStopped => {
                println!("[stopped] worker={:?} task={:?}", e.worker, e.task);
            }
            EventKind::TaskFailed => {
                println!(
                    "[failed] worker={:?} task={:?} err={:?}",
                    e.worker, e.task, e.reason
                );
            }
            EventKind::SubmitRejected => {
                println!("[submit-rejected] worker={:?}", e.worker);
            }
            EventKind::RetryScheduled => {
                println!(
                    "[retry] attempt={:?} delay_ms={:?} err={:?}",
                    e.attempt, e.delay_ms, e.reason
                );
            }
            EventKind::RetryExhausted => {
                println!("[retry-exhausted] attempts={:?} err={:?}", e.attempt, e.reason);
            }
            EventKind::RetryCanceled => {
                println!("[retry-canceled] attempts={:?}", e.attempt);
            }
            EventKind::SessionStarted => {
                println!(
                    "[session-started] session={:?} ordering={:?}",
                    e.worker, e.ordering
                );
            }
            EventKind::Committed => {
                println!("[committed] worker={:?}", e.worker);
            }
            EventKind::RolledBack => {
                println!("[rolled-back] worker={:?}", e.worker);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested] worker={:?}", e.worker);
            }
            EventKind::HooksFinished => {
                println!("[hooks-finished] worker={:?}", e.worker);
            }
            EventKind::CloseFailed => {
                println!("[close-failed] worker={:?} err={:?}", e.worker, e.reason);
            }
            EventKind::WorkerStopped => {
                println!("[worker-stopped] worker={:?}", e.worker);
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] sub={:?} info={:?}", e.task, e.reason);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] sub={:?} reason={:?}", e.task, e.reason);
            }
        }
    }
}
