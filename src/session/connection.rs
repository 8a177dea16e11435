//! # Connections and native session handles.
//!
//! [`Connection`] is the factory a session starts from: it declares which
//! [`Ordering`] levels it can provide and opens one native handle per
//! session. [`SessionHandle`] is the handle itself — the single-threaded
//! middleware object every task runs against.
//!
//! ## Negotiation
//! Session creation asks for a level and receives the **weakest offered
//! level that satisfies the request** — a silent upgrade when the exact
//! level is unavailable but a stronger one is, an
//! [`UnsupportedOrdering`](crate::SessionError::UnsupportedOrdering) error
//! when nothing strong enough exists. Each session-start request negotiates
//! independently; no upgraded state is cached on the connection.

use crate::error::{SessionError, TaskError};
use crate::session::ordering::Ordering;

/// A native per-session middleware handle.
///
/// The handle is **not** assumed thread-safe: after session start it lives
/// on the worker thread and is only ever touched there. `Send` is required
/// once, to move it onto that thread.
///
/// `commit`/`rollback` have no-op defaults so handles for middleware without
/// transaction support implement only `close`.
pub trait SessionHandle: Send + 'static {
    /// Closes the native handle. Runs on the worker thread, after
    /// pre-shutdown hooks, as the worker's final act.
    fn close(&mut self) -> Result<(), TaskError>;

    /// Commits every unit of work since the previous commit/rollback.
    /// Called only on [`Ordering::Transactional`] sessions.
    fn commit(&mut self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Rolls back every unit of work since the previous commit/rollback.
    /// Called only on [`Ordering::Transactional`] sessions.
    fn rollback(&mut self) -> Result<(), TaskError> {
        Ok(())
    }
}

/// A middleware connection sessions are started from.
pub trait Connection: Send + Sync + 'static {
    /// The native handle type this connection opens.
    type Handle: SessionHandle;

    /// Reports whether this connection can provide `level`.
    fn offers(&self, level: Ordering) -> bool;

    /// Opens a native per-session handle at the already-negotiated `level`.
    fn open(&self, level: Ordering) -> Result<Self::Handle, SessionError>;
}

/// Picks the weakest offered level satisfying `requested`.
///
/// Errs with [`SessionError::UnsupportedOrdering`] (naming the strongest
/// offered level) when no offered level is strong enough.
pub(crate) fn negotiate<C: Connection + ?Sized>(
    connection: &C,
    requested: Ordering,
) -> Result<Ordering, SessionError> {
    for level in Ordering::ALL {
        if level.satisfies(requested) && connection.offers(level) {
            return Ok(level);
        }
    }
    let strongest = Ordering::ALL
        .iter()
        .rev()
        .copied()
        .find(|l| connection.offers(*l))
        .unwrap_or(Ordering::Unordered);
    Err(SessionError::UnsupportedOrdering {
        requested,
        strongest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(Vec<Ordering>);

    impl Connection for Stub {
        type Handle = StubHandle;
        fn offers(&self, level: Ordering) -> bool {
            self.0.contains(&level)
        }
        fn open(&self, _level: Ordering) -> Result<StubHandle, SessionError> {
            Ok(StubHandle)
        }
    }

    struct StubHandle;
    impl SessionHandle for StubHandle {
        fn close(&mut self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn test_exact_match_wins() {
        let conn = Stub(vec![Ordering::Ordered, Ordering::Transactional]);
        assert_eq!(negotiate(&conn, Ordering::Ordered), Ok(Ordering::Ordered));
    }

    #[test]
    fn test_silent_upgrade_to_weakest_sufficient() {
        let conn = Stub(vec![Ordering::Ordered, Ordering::Transactional]);
        assert_eq!(negotiate(&conn, Ordering::Unordered), Ok(Ordering::Ordered));
    }

    #[test]
    fn test_no_silent_downgrade() {
        let conn = Stub(vec![Ordering::Ordered]);
        assert_eq!(
            negotiate(&conn, Ordering::Transactional),
            Err(SessionError::UnsupportedOrdering {
                requested: Ordering::Transactional,
                strongest: Ordering::Ordered,
            })
        );
    }
}
