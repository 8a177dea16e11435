//! # Idempotent graceful shutdown.
//!
//! Exactly one caller wins the `Started → Stopping` transition and drives the
//! sequence; every other caller — concurrent or later — awaits and receives
//! the identical cached outcome.
//!
//! ## Shutdown sequence
//! ```text
//! shutdown(close, timeout)
//!   ├─► CAS Started → Stopping          (losers await the cached outcome)
//!   ├─► publish ShutdownRequested       (submissions now refused)
//!   ├─► drain hook registry (FIFO)
//!   ├─► enqueue Close directive         (behind already-queued work)
//!   │      worker thread: hooks → HooksFinished → close(&mut handle) → break
//!   ├─► await close result, bounded by `timeout`
//!   │      Ok          → Ok(())
//!   │      close error → SessionError::Close      (thread still retires)
//!   │      timeout     → SessionError::ShutdownTimeout (thread detached)
//!   └─► state = Stopped; cache outcome in the watch channel
//! ```
//!
//! ## Rules
//! - Work queued **before** shutdown still executes, in FIFO order, ahead of
//!   the hooks and the close.
//! - Hooks complete before the native close runs, after submissions are
//!   refused.
//! - A close overrunning the timeout reports failure but never blocks thread
//!   retirement: the thread is left to finish in the background.

use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{SessionError, TaskError};
use crate::events::{Event, EventKind};
use crate::worker::worker::{Directive, SessionWorker, STARTED, STOPPED, STOPPING};

impl<H: Send + 'static> SessionWorker<H> {
    /// Stops accepting new work, runs pre-shutdown hooks, runs `close`, and
    /// retires the worker thread.
    ///
    /// Idempotent: the first caller drives the sequence; concurrent and later
    /// callers observe the same cached outcome. The losing callers' `close`
    /// closures are dropped unused.
    pub async fn shutdown<F>(&self, close: F, timeout: Duration) -> Result<(), SessionError>
    where
        F: FnOnce(&mut H) -> Result<(), TaskError> + Send + 'static,
    {
        let drives = self
            .shared
            .state
            .compare_exchange(
                STARTED,
                STOPPING,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            )
            .is_ok();
        if !drives {
            return self.await_outcome().await;
        }

        self.shared.bus.publish(
            Event::new(EventKind::ShutdownRequested).with_worker(Arc::clone(&self.shared.name)),
        );

        let hooks = self.shared.hooks.drain();
        let (done_tx, done_rx) = oneshot::channel();
        let directive = Directive::Close {
            hooks,
            close: Box::new(close),
            done: done_tx,
        };

        let res = if self.shared.tx.send(directive).is_err() {
            Err(SessionError::Stopped)
        } else {
            match tokio::time::timeout(timeout, done_rx).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => {
                    self.shared.bus.publish(
                        Event::new(EventKind::CloseFailed)
                            .with_worker(Arc::clone(&self.shared.name))
                            .with_reason(e.to_string()),
                    );
                    Err(SessionError::Close {
                        error: e.to_string(),
                    })
                }
                // The worker thread died without reporting; nothing to wait for.
                Ok(Err(_)) => Err(SessionError::Stopped),
                // Close overran: detach the thread, report the overrun.
                Err(_elapsed) => Err(SessionError::ShutdownTimeout { grace: timeout }),
            }
        };

        self.shared.state.store(STOPPED, AtomicOrdering::SeqCst);
        let _ = self.shared.outcome.send(Some(res.clone()));
        res
    }

    /// Waits for the driving caller to publish the shutdown outcome.
    async fn await_outcome(&self) -> Result<(), SessionError> {
        let mut rx = self.shared.outcome.subscribe();
        loop {
            if let Some(res) = rx.borrow_and_update().clone() {
                return res;
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::Stopped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::events::Bus;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn test_worker() -> SessionWorker<Vec<String>> {
        let cfg = SessionConfig::default();
        SessionWorker::spawn("shutdown", Vec::new(), &cfg, Bus::new(cfg.bus_capacity))
            .expect("worker spawns")
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_before_close() {
        let worker = test_worker();
        let record: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let record = Arc::clone(&record);
            worker
                .add_pre_shutdown_hook(move || record.lock().unwrap().push(label))
                .expect("hook registered");
        }

        let close_record = Arc::clone(&record);
        worker
            .shutdown(
                move |_h| {
                    close_record.lock().unwrap().push("close");
                    Ok(())
                },
                Duration::from_secs(5),
            )
            .await
            .expect("shutdown succeeds");

        assert_eq!(*record.lock().unwrap(), vec!["a", "b", "c", "close"]);
    }

    #[tokio::test]
    async fn test_queued_work_drains_before_close() {
        let worker = test_worker();
        for i in 0..3 {
            let _ = worker.submit(move |h| h.push(i.to_string())).await;
        }
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_close = Arc::clone(&seen);
        worker
            .shutdown(
                move |h| {
                    *seen_in_close.lock().unwrap() = h.clone();
                    Ok(())
                },
                Duration::from_secs(5),
            )
            .await
            .expect("shutdown succeeds");

        let expected: Vec<String> = (0..3).map(|i| i.to_string()).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_shutdown_observes_one_outcome() {
        let worker = test_worker();
        let close_runs = Arc::new(AtomicUsize::new(0));

        let close = |runs: &Arc<AtomicUsize>| {
            let runs = Arc::clone(runs);
            move |_h: &mut Vec<String>| -> Result<(), TaskError> {
                runs.fetch_add(1, AtomicOrdering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(())
            }
        };
        let a = worker.clone();
        let b = worker.clone();
        let (ra, rb) = tokio::join!(
            a.shutdown(close(&close_runs), Duration::from_secs(5)),
            b.shutdown(close(&close_runs), Duration::from_secs(5)),
        );

        assert_eq!(ra, rb, "concurrent callers must see the identical outcome");
        assert_eq!(
            close_runs.load(AtomicOrdering::SeqCst),
            1,
            "close task must run exactly once"
        );
    }

    #[tokio::test]
    async fn test_later_shutdown_returns_cached_outcome() {
        let worker = test_worker();
        let first = worker
            .shutdown(|_h| Err(TaskError::failed("no route")), Duration::from_secs(5))
            .await;
        assert_eq!(
            first,
            Err(SessionError::Close {
                error: "execution failed: no route".to_string()
            })
        );

        // A later call with a close task that would succeed still replays
        // the cached failure; its closure never runs.
        let second = worker.shutdown(|_h| Ok(()), Duration::from_secs(5)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_submissions_refused_after_shutdown() {
        let worker = test_worker();
        worker
            .shutdown(|_h| Ok(()), Duration::from_secs(5))
            .await
            .expect("shutdown succeeds");

        assert_eq!(
            worker.submit(|_h| ()).await,
            Err(SessionError::Stopped),
            "submit must fail fast after shutdown"
        );
        assert!(matches!(
            worker.add_pre_shutdown_hook(|| {}),
            Err(SessionError::Stopped)
        ));
        assert_eq!(worker.state(), crate::worker::WorkerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submission_refused_while_stopping() {
        use crate::worker::worker::{Job, WorkerState};

        let worker = test_worker();
        // Hold the worker thread so shutdown stays in Stopping.
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let gate: Job<Vec<String>> = Box::new(move |_h| {
            let _ = gate_rx.recv();
        });
        worker
            .shared
            .tx
            .send(Directive::Run(gate))
            .expect("worker alive");

        let driver = worker.clone();
        let shutdown_task =
            tokio::spawn(async move { driver.shutdown(|_h| Ok(()), Duration::from_secs(5)).await });

        while worker.state() == WorkerState::Started {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(
            worker.submit(|_h| ()).await,
            Err(SessionError::Stopped),
            "submissions are refused as soon as shutdown begins"
        );

        drop(gate_tx);
        shutdown_task
            .await
            .expect("driver task finishes")
            .expect("shutdown succeeds");
    }

    #[tokio::test]
    async fn test_shutdown_timeout_detaches_thread() {
        let worker = test_worker();
        let res = worker
            .shutdown(
                |_h| {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(())
                },
                Duration::from_millis(30),
            )
            .await;
        assert_eq!(
            res,
            Err(SessionError::ShutdownTimeout {
                grace: Duration::from_millis(30)
            })
        );

        // The overrun is the cached terminal outcome.
        let again = worker.shutdown(|_h| Ok(()), Duration::from_secs(5)).await;
        assert_eq!(res, again);
    }
}
