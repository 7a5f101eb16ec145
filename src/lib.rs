//! Callback-driven computations written as straight-line code.
//!
//! This crate lets sequential-looking logic run on top of a single-threaded,
//! callback-based event loop. A computation suspends at well-defined yield
//! points (a [`Future`], a keyed callback, a parallel wait) and is resumed by
//! its runner when the point settles, either synchronously when the outcome is
//! already known or later from the loop.
//!
//! # Architecture
//!
//! - **IoLoop**: single-threaded loop running scheduled callbacks and timers
//! - **Future**: one-shot shared container for a value or a failure
//! - **Callback**: completion callback bound to a future, capturing its payload
//! - **ExceptionContext**: routes failures of deferred callbacks to their owner
//! - **coro**: the runner, yield points, keyed callback registry, and the
//!   [`engine`] / [`coroutine`] entry points
//! - **IoLoopBuilder**: fluent builder for loop configuration
//! - **time**: sleeps and timeouts composed from loop timers
//!
//! # Example
//!
//! ```
//! use genloop::{coroutine, IoLoop, Value};
//! use std::time::Duration;
//!
//! let io_loop = IoLoop::new();
//! let lp = io_loop.clone();
//!
//! let value = io_loop
//!     .run_sync(move |co| async move {
//!         let (a, b) = (lp.sleep(Duration::from_millis(1)), coroutine(|_co| async { Ok(2) }));
//!         let both = co.suspend(vec![a, b]).await?;
//!         Ok(both)
//!     })
//!     .unwrap();
//!
//! assert_eq!(value, Value::List(vec![Value::None, Value::Int(2)]));
//! ```

mod arguments;
mod builder;
mod error;
mod future;
mod value;

pub mod coro;
pub mod runtime;
pub mod time;

pub use arguments::Arguments;
pub use builder::{IoLoopBuilder, UnhandledPolicy};
pub use error::{Error, GenError, Result};
pub use future::{return_future, Callback, Future};
pub use coro::{coroutine, engine, Co, Multi, Task, Wait, WaitAll, YieldPoint};
pub use runtime::{yield_now, IoLoop, TimeoutHandle};
pub use value::{Key, Value};
