//! # Retry policy: resubscription bound plus optional backoff delay.
//!
//! [`RetryPolicy`] bundles the retry bound with an optional [`Backoff`]
//! schedule. The default (and the plain [`retry`](crate::retry())
//! decorator) resubscribes immediately; a backoff inserts a growing,
//! optionally jittered delay between a failure and its resubscription.
//!
//! The delay for the n-th failed attempt is `first × factor^(n-1)`, clamped
//! to `max`, then jittered. The base is derived purely from the attempt
//! number; jitter output never feeds back into subsequent delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use seriate::{Backoff, Jitter, RetryPolicy};
//!
//! let backoff = Backoff {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: Jitter::None,
//! };
//!
//! // First failed attempt retries after `first`.
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! // Then first × factor^(n-1), clamped to max.
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(12), Duration::from_secs(10));
//!
//! let policy = RetryPolicy::with_backoff(5, backoff);
//! assert_eq!(policy.max_retries, 5);
//! ```

use std::time::Duration;

use rand::Rng;

/// How a retry decorator resubscribes: how many times, and how long to wait.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of resubscriptions after the initial attempt.
    /// Zero means the delegate is returned unchanged; negative is rejected.
    pub max_retries: i32,
    /// Delay schedule between a failure and its resubscription.
    /// `None` resubscribes immediately.
    pub backoff: Option<Backoff>,
}

impl RetryPolicy {
    /// Resubscribe immediately, up to `max_retries` times.
    pub fn immediate(max_retries: i32) -> Self {
        Self {
            max_retries,
            backoff: None,
        }
    }

    /// Resubscribe with the given delay schedule, up to `max_retries` times.
    pub fn with_backoff(max_retries: i32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff: Some(backoff),
        }
    }
}

/// Delay schedule between failed attempts.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to the clamped base delay.
    pub jitter: Jitter,
}

impl Default for Backoff {
    /// Returns a schedule with:
    /// - `first = 100ms`
    /// - `max = 30s`
    /// - `factor = 2.0`
    /// - `jitter = Jitter::None`
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: Jitter::None,
        }
    }
}

impl Backoff {
    /// Computes the delay after failed attempt `attempt` (1-based).
    ///
    /// The base is `first × factor^(attempt-1)`, clamped to `max`; jitter is
    /// applied to the clamped base and never fed back into later attempts.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max.as_secs_f64();
        let raw = self.first.as_secs_f64() * self.factor.powi(exponent);

        let base = if !raw.is_finite() || raw < 0.0 || raw > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw)
        };
        self.jitter.apply(base)
    }
}

/// Randomization of backoff delays, to avoid synchronized retries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter: use the exact base delay.
    #[default]
    None,
    /// Random delay in `[0, base]`. Maximum load spreading.
    Full,
    /// `base/2 + random[0, base/2]`. Balanced (keeps ~75% of the base).
    Equal,
}

impl Jitter {
    /// Applies this jitter to `base`.
    pub fn apply(self, base: Duration) -> Duration {
        match self {
            Jitter::None => base,
            Jitter::Full => {
                let secs = rand::thread_rng().gen_range(0.0..=base.as_secs_f64());
                Duration::from_secs_f64(secs)
            }
            Jitter::Equal => {
                let half = base.as_secs_f64() / 2.0;
                let secs = half + rand::thread_rng().gen_range(0.0..=half);
                Duration::from_secs_f64(secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first_ms: u64, max_s: u64, factor: f64) -> Backoff {
        Backoff {
            first: Duration::from_millis(first_ms),
            max: Duration::from_secs(max_s),
            factor,
            jitter: Jitter::None,
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let backoff = plain(100, 30, 2.0);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_constant_factor_stays_at_first() {
        let backoff = plain(500, 30, 1.0);
        for attempt in 1..10 {
            assert_eq!(
                backoff.delay(attempt),
                Duration::from_millis(500),
                "attempt {} should stay at 500ms",
                attempt
            );
        }
    }

    #[test]
    fn test_clamped_to_max() {
        let backoff = plain(100, 1, 2.0);
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
    }

    #[test]
    fn test_first_exceeding_max_is_clamped() {
        let backoff = Backoff {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: Jitter::None,
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(5));
    }

    #[test]
    fn test_overflowing_attempt_clamps_to_max() {
        let backoff = plain(100, 60, 2.0);
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_full_jitter_bounds() {
        let backoff = Backoff {
            jitter: Jitter::Full,
            ..plain(1000, 30, 1.0)
        };
        for attempt in 1..50 {
            assert!(backoff.delay(attempt) <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let backoff = Backoff {
            jitter: Jitter::Equal,
            ..plain(1000, 30, 1.0)
        };
        for attempt in 1..50 {
            let delay = backoff.delay(attempt);
            assert!(delay >= Duration::from_millis(500), "below half: {delay:?}");
            assert!(delay <= Duration::from_millis(1000), "above base: {delay:?}");
        }
    }

    #[test]
    fn test_policy_constructors() {
        assert!(RetryPolicy::immediate(3).backoff.is_none());
        let with = RetryPolicy::with_backoff(3, Backoff::default());
        assert_eq!(with.max_retries, 3);
        assert!(with.backoff.is_some());
    }
}
