//! Sequential-looking computations on top of callbacks.
//!
//! A computation is an `async` body that receives a [`Co`] handle and awaits
//! yield points through it. Between yield points it runs synchronously; at a
//! yield point it is parked until the point settles, then resumed with the
//! outcome (or with the failure, which `?` propagates like any other error).
//!
//! There are two ways to start a computation:
//!
//! - [`engine`]: fire-and-forget. Nobody receives a value, so producing one is
//!   an error. Failures before the first suspension are returned to the
//!   caller; later ones are routed through the exception context.
//! - [`coroutine`]: value-producing. The caller gets a [`Future`] right away,
//!   and every outcome, failures included, is delivered through it.
//!
//! # Example
//!
//! ```
//! use genloop::coro::coroutine;
//! use genloop::{IoLoop, Value};
//!
//! let io_loop = IoLoop::new();
//! let lp = io_loop.clone();
//!
//! let future = coroutine(move |co| async move {
//!     let callback = co.callback("k1")?;
//!     lp.add_callback(move || {
//!         callback.call_with("v1");
//!         Ok(())
//!     });
//!     let value = co.wait("k1").await?;
//!     Ok(value)
//! });
//!
//! io_loop.run().unwrap();
//! assert_eq!(future.result().unwrap(), Value::from("v1"));
//! ```

mod registry;
mod runner;
mod yield_point;

pub use yield_point::{Multi, Task, Wait, WaitAll, YieldPoint, Yielded};

use crate::error::{Error, GenError, Result};
use crate::future::{Callback, Future};
use crate::runtime::context::{self, ExceptionContext, ExceptionHandler};
use crate::value::{Key, Value};
use runner::Runner;

use std::fmt;
use std::future::Future as StdFuture;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// Handle a computation uses to reach its runner.
///
/// The handle only holds the runner weakly; using it after the computation
/// has ended fails with [`GenError::Finished`].
#[derive(Clone)]
pub struct Co {
    runner: Weak<Runner>,
}

impl Co {
    fn new(runner: Weak<Runner>) -> Self {
        Self { runner }
    }

    /// Suspends the computation on `yielded` until it settles.
    pub fn suspend(&self, yielded: impl Into<Yielded>) -> Suspend {
        Suspend {
            runner: self.runner.clone(),
            yielded: Some(yielded.into()),
        }
    }

    /// Registers a callback slot for `key`.
    ///
    /// Fails with [`GenError::KeyReuse`] while a slot for `key` is pending.
    pub fn callback(&self, key: impl Into<Key>) -> Result<Callback> {
        let runner = self.runner.upgrade().ok_or(GenError::Finished)?;
        runner.register(key.into())
    }

    /// Suspends until the callback registered for `key` fires.
    pub fn wait(&self, key: impl Into<Key>) -> Suspend {
        self.suspend(Wait::new(key))
    }

    /// Suspends until the callbacks for all `keys` fire.
    pub fn wait_all<I>(&self, keys: I) -> Suspend
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        self.suspend(WaitAll::new(keys))
    }

    /// Suspends on a callback-style operation, see [`Task`].
    pub fn task<F>(&self, operation: F) -> Suspend
    where
        F: FnOnce(Callback) -> Result<()> + 'static,
    {
        self.suspend(Task::new(operation))
    }

    /// Number of callback slots currently registered.
    pub fn pending_callbacks(&self) -> usize {
        self.runner
            .upgrade()
            .map_or(0, |runner| runner.registry.borrow().len())
    }
}

impl fmt::Debug for Co {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Co")
            .field("alive", &(self.runner.strong_count() > 0))
            .finish()
    }
}

/// A pending suspension, resolved with the yield point's outcome.
///
/// Only meaningful when awaited directly by a computation body.
#[must_use = "yield points do nothing unless awaited"]
pub struct Suspend {
    runner: Weak<Runner>,
    yielded: Option<Yielded>,
}

impl StdFuture for Suspend {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(runner) = self.runner.upgrade() else {
            return Poll::Ready(Err(GenError::Finished.into()));
        };

        if let Some(yielded) = self.yielded.take() {
            runner.offer(yielded);
            return Poll::Pending;
        }

        match runner.take_sent() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

struct EngineHandler {
    runner: Weak<Runner>,
}

impl ExceptionHandler for EngineHandler {
    fn handle_exception(&self, err: Error) -> Result<()> {
        match self.runner.upgrade() {
            Some(runner) if !runner.is_finished() => runner.handle_exception(err),
            _ => Err(err),
        }
    }
}

struct CoroutineHandler {
    runner: Weak<Runner>,
    future: Future,
}

impl ExceptionHandler for CoroutineHandler {
    fn handle_exception(&self, err: Error) -> Result<()> {
        match self.runner.upgrade() {
            Some(runner) if !runner.is_finished() => runner.handle_exception(err),
            _ if !self.future.done() => self.future.set_exception(err),
            _ => Err(err),
        }
    }
}

/// Starts a fire-and-forget computation.
///
/// Runs `body` synchronously up to its first suspension that is not already
/// settled. A failure up to that point is returned from this call. After it,
/// the terminal outcome is delivered to whoever resumed the computation and
/// from there through the exception context that was current here.
///
/// Producing a value other than [`Value::None`] fails with
/// [`GenError::ReturnValueIgnored`].
pub fn engine<F, Fut, R>(body: F) -> Result<()>
where
    F: FnOnce(Co) -> Fut,
    Fut: StdFuture<Output = Result<R>> + 'static,
    R: Into<Value> + 'static,
{
    let runner = Runner::new(Box::new(|outcome: Result<Value>| match outcome {
        Ok(Value::None) => Ok(()),
        Ok(value) => Err(GenError::ReturnValueIgnored(value).into()),
        Err(err) => Err(err),
    }));

    let handler = Rc::new(EngineHandler {
        runner: Rc::downgrade(&runner),
    });
    runner.start(ExceptionContext::new(handler), body)
}

/// Starts a value-producing computation and returns its [`Future`].
///
/// Nothing is raised at the call site: the value, or any failure at any
/// point, settles the returned future.
pub fn coroutine<F, Fut, R>(body: F) -> Future
where
    F: FnOnce(Co) -> Fut,
    Fut: StdFuture<Output = Result<R>> + 'static,
    R: Into<Value> + 'static,
{
    let future = Future::new();

    let result = future.clone();
    let runner = Runner::new(Box::new(move |outcome: Result<Value>| match outcome {
        Ok(value) => result.set_result(value),
        Err(err) => result.set_exception(err),
    }));

    let handler = Rc::new(CoroutineHandler {
        runner: Rc::downgrade(&runner),
        future: future.clone(),
    });
    let context = ExceptionContext::new(handler);

    if let Err(err) = runner.start(context.clone(), body) {
        context::route(context.parent(), err);
    }

    future
}
