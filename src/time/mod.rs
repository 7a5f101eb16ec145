//! Time utilities built from loop timers.
//!
//! - [`sleep`] for a future that resolves after a delay
//! - [`with_timeout`] for bounding how long a future may stay pending
//!
//! The engine has no timeouts of its own; everything here is composed from
//! [`IoLoop::add_timeout`](crate::IoLoop::add_timeout).
//!
//! # Example: Timeout
//!
//! ```
//! use genloop::time::timeout;
//! use genloop::{Future, GenError, IoLoop};
//! use std::time::Duration;
//!
//! let io_loop = IoLoop::new();
//! let never = Future::new();
//! let bounded = timeout(&io_loop, Duration::from_millis(5), never);
//!
//! io_loop.run().unwrap();
//! let err = bounded.result().unwrap_err();
//! assert!(matches!(err.downcast_ref(), Some(GenError::Timeout)));
//! ```

pub mod timeout;

pub use timeout::{timeout, with_timeout};

use crate::future::Future;
use crate::runtime::IoLoop;

use std::time::Duration;

/// Returns a future that resolves after `delay` on the current loop.
///
/// # Panics
/// Panics if called outside of a running [`IoLoop`].
pub fn sleep(delay: Duration) -> Future {
    IoLoop::current().sleep(delay)
}
