//! Deadlines for futures.
//!
//! [`with_timeout`] returns a new [`Future`] that mirrors the wrapped one if it
//! settles in time and fails with [`GenError::Timeout`] otherwise. The wrapped
//! future is not cancelled: there is no cancellation in this model, so its
//! late outcome is simply dropped.

use crate::error::{GenError, Result};
use crate::future::Future;
use crate::runtime::context;
use crate::runtime::IoLoop;

use std::time::{Duration, Instant};

/// Bounds `future` by `deadline`.
///
/// The timer is removed from the loop as soon as `future` settles.
pub fn with_timeout(io_loop: &IoLoop, deadline: Instant, future: Future) -> Future {
    let bounded = Future::new();

    let on_timeout = bounded.clone();
    let handle = io_loop.add_timeout(deadline, move || {
        if on_timeout.done() {
            return Ok(());
        }
        tracing::debug!("future timed out");
        on_timeout.set_exception(GenError::Timeout)
    });

    let io_loop = io_loop.clone();
    let mirror = bounded.clone();
    let wired = future.add_done_callback(move |settled| {
        io_loop.remove_timeout(handle);
        forward(settled, &mirror)
    });

    if let Err(err) = wired {
        context::route(context::current().as_ref(), err);
    }

    bounded
}

/// Bounds `future` by `duration` from now.
pub fn timeout(io_loop: &IoLoop, duration: Duration, future: Future) -> Future {
    with_timeout(io_loop, io_loop.time() + duration, future)
}

fn forward(settled: &Future, mirror: &Future) -> Result<()> {
    let outcome = settled.result();

    if mirror.done() {
        if let Err(err) = outcome {
            tracing::debug!(error = %err, "failure after timeout dropped");
        }
        return Ok(());
    }

    match outcome {
        Ok(value) => mirror.set_result(value),
        Err(err) => mirror.set_exception(err),
    }
}
