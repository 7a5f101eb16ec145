//! Deadline-ordered timers for the loop.
//!
//! Timers are kept in a plain list: the loop fires everything whose deadline
//! has passed and sleeps until the nearest remaining deadline otherwise.

use crate::runtime::queue::Scheduled;

use std::time::{Duration, Instant};

/// Identifies a scheduled timeout so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutHandle(u64);

struct Timer {
    deadline: Instant,
    handle: TimeoutHandle,
    callback: Scheduled,
}

/// Manages registered timers and releases them once their deadline is reached.
pub(crate) struct TimerDriver {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerDriver {
    pub(crate) fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers `callback` to run no earlier than `deadline`.
    pub(crate) fn register(&mut self, deadline: Instant, callback: Scheduled) -> TimeoutHandle {
        let handle = TimeoutHandle(self.next_id);
        self.next_id += 1;

        self.timers.push(Timer {
            deadline,
            handle,
            callback,
        });

        handle
    }

    /// Drops a pending timer. Unknown or already fired handles are ignored.
    pub(crate) fn cancel(&mut self, handle: TimeoutHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.handle != handle);
        before != self.timers.len()
    }

    /// Removes every timer whose deadline has passed, earliest first.
    ///
    /// Timers sharing a deadline keep their registration order.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<Scheduled> {
        let (mut expired, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|timer| timer.deadline <= now);
        self.timers = pending;

        expired.sort_by_key(|timer| (timer.deadline, timer.handle.0));
        expired.into_iter().map(|timer| timer.callback).collect()
    }

    /// Returns the time remaining until the next timer deadline, if any.
    pub(crate) fn next_remaining(&self, now: Instant) -> Option<Duration> {
        self.timers
            .iter()
            .map(|timer| timer.deadline.saturating_duration_since(now))
            .min()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
