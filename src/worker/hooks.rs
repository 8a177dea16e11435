//! # Pre-shutdown hook registry.
//!
//! Resources layered on a session (consumers, producers, caches) register a
//! hook to release state before the native handle closes. Hooks run on the
//! worker thread, in registration order, after new submissions are refused
//! and before the close operation.

use std::sync::Mutex;

/// A one-shot callback run during shutdown, before the native close.
pub(crate) type PreShutdownHook = Box<dyn FnOnce() + Send + 'static>;

/// FIFO registry of pre-shutdown hooks.
///
/// Registration order is execution order. The registry is drained exactly
/// once, by the shutdown driver.
pub(crate) struct HookRegistry {
    inner: Mutex<Vec<PreShutdownHook>>,
}

impl HookRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, hook: PreShutdownHook) {
        let mut hooks = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        hooks.push(hook);
    }

    /// Takes every registered hook, leaving the registry empty.
    pub(crate) fn drain(&self) -> Vec<PreShutdownHook> {
        let mut hooks = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[test]
    fn test_drain_preserves_registration_order() {
        let registry = HookRegistry::new();
        let next = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            let next = Arc::clone(&next);
            registry.push(Box::new(move || {
                let slot = next.fetch_add(1, AtomicOrdering::SeqCst);
                order.lock().unwrap().push((slot, label));
            }));
        }

        for hook in registry.drain() {
            hook();
        }
        let order = order.lock().unwrap();
        assert_eq!(*order, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert!(registry.drain().is_empty(), "drain leaves the registry empty");
    }
}
