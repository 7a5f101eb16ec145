//! Fluent builder for IoLoop construction.
//!
//! Provides a builder pattern interface for creating and configuring IoLoop instances.

use crate::runtime::IoLoop;

use std::time::Duration;

/// What a loop does with an error that no exception handler claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledPolicy {
    /// Stop the loop and return the error from [`IoLoop::run`].
    #[default]
    Stop,
    /// Log the error and keep running.
    Log,
}

/// Builder for constructing IoLoop instances with fluent API.
///
/// # Example
/// ```
/// use genloop::{IoLoopBuilder, UnhandledPolicy};
/// use std::time::Duration;
///
/// let io_loop = IoLoopBuilder::new()
///     .unhandled(UnhandledPolicy::Log)
///     .max_idle_sleep(Duration::from_millis(5))
///     .build();
/// io_loop.run().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct IoLoopBuilder {
    unhandled: UnhandledPolicy,
    max_idle_sleep: Duration,
}

impl Default for IoLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IoLoopBuilder {
    /// Creates a new loop builder with the default configuration.
    pub fn new() -> Self {
        Self {
            unhandled: UnhandledPolicy::Stop,
            max_idle_sleep: Duration::from_millis(100),
        }
    }

    /// Sets how unhandled errors are surfaced.
    pub fn unhandled(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled = policy;
        self
    }

    /// Caps how long a single idle wait for the next timer may sleep.
    pub fn max_idle_sleep(mut self, max: Duration) -> Self {
        self.max_idle_sleep = max;
        self
    }

    /// Builds and returns a configured IoLoop instance.
    pub fn build(self) -> IoLoop {
        IoLoop::with_config(self.unhandled, self.max_idle_sleep)
    }
}
