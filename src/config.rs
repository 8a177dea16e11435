//! # Session runtime configuration.
//!
//! [`SessionConfig`] centralizes the knobs shared by every worker a process
//! starts: event bus capacity, the default shutdown grace period, and the
//! prefix used when naming worker threads.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use seriate::SessionConfig;
//!
//! let mut cfg = SessionConfig::default();
//! cfg.grace = Duration::from_secs(10);
//! cfg.bus_capacity = 256;
//!
//! assert_eq!(cfg.bus_capacity, 256);
//! ```

use std::time::Duration;

/// Configuration for sessions and their workers.
///
/// Controls event delivery capacity, default shutdown grace, and worker
/// thread naming.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Capacity of the lifecycle event bus channel.
    pub bus_capacity: usize,
    /// Capacity of each task's multicast output ring. A subscriber that
    /// falls more than this many updates behind observes a lag gap.
    pub task_buffer: usize,
    /// Default timeout for `Session::close` when the caller does not supply one.
    pub grace: Duration,
    /// Prefix for worker thread names (`"<prefix>-<session name>"`).
    pub thread_prefix: String,
}

impl Default for SessionConfig {
    /// Provides a default configuration:
    /// - `bus_capacity = 1024`
    /// - `task_buffer = 256`
    /// - `grace = 30s`
    /// - `thread_prefix = "seriate"`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            task_buffer: 256,
            grace: Duration::from_secs(30),
            thread_prefix: "seriate".to_string(),
        }
    }
}
