//! Single-threaded event loop that hosts computations.
//!
//! The loop runs scheduled callbacks in FIFO order, fires expired timers, and
//! sleeps until the next deadline when nothing else is ready. Unlike a server
//! loop it returns as soon as it runs out of work, which makes it convenient to
//! drive from tests and command-line tools.

use crate::builder::{IoLoopBuilder, UnhandledPolicy};
use crate::error::{Error, GenError, Result};
use crate::future::Future;
use crate::coro::{self, Co};
use crate::runtime::context::{self, enter_loop};
use crate::runtime::queue::{CallbackQueue, Scheduled};
use crate::runtime::timer::{TimeoutHandle, TimerDriver};
use crate::value::Value;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

struct LoopInner {
    queue: CallbackQueue,
    timers: RefCell<TimerDriver>,
    running: Cell<bool>,
    unhandled: RefCell<Option<Error>>,
    policy: UnhandledPolicy,
    max_idle_sleep: Duration,
}

/// Handle to a single-threaded event loop.
///
/// Handles are cheap to clone and all refer to the same loop.
#[derive(Clone)]
pub struct IoLoop {
    inner: Rc<LoopInner>,
}

impl IoLoop {
    /// Creates a loop with the default configuration.
    ///
    /// # Example
    /// ```
    /// let io_loop = genloop::IoLoop::new();
    /// io_loop.run().unwrap();
    /// ```
    pub fn new() -> Self {
        IoLoopBuilder::new().build()
    }

    /// Returns a builder for a customized loop.
    pub fn builder() -> IoLoopBuilder {
        IoLoopBuilder::new()
    }

    pub(crate) fn with_config(policy: UnhandledPolicy, max_idle_sleep: Duration) -> Self {
        Self {
            inner: Rc::new(LoopInner {
                queue: CallbackQueue::new(),
                timers: RefCell::new(TimerDriver::new()),
                running: Cell::new(false),
                unhandled: RefCell::new(None),
                policy,
                max_idle_sleep,
            }),
        }
    }

    /// Returns the loop running on this thread.
    ///
    /// # Panics
    /// Panics if called outside of [`IoLoop::run`].
    pub fn current() -> IoLoop {
        Self::try_current().expect("IoLoop::current() called outside of a running IoLoop")
    }

    /// Returns the loop running on this thread, if any.
    pub fn try_current() -> Option<IoLoop> {
        context::current_loop()
    }

    /// The loop's notion of the current time.
    pub fn time(&self) -> Instant {
        Instant::now()
    }

    /// Schedules `callback` to run on a later loop iteration.
    ///
    /// The current exception context is captured and re-entered when the
    /// callback runs; an `Err` it returns is routed through that context.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.inner.queue.push(Scheduled::new(callback));
    }

    /// Schedules `callback` to run no earlier than `deadline`.
    pub fn add_timeout<F>(&self, deadline: Instant, callback: F) -> TimeoutHandle
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        let handle = self
            .inner
            .timers
            .borrow_mut()
            .register(deadline, Scheduled::new(callback));
        tracing::trace!(?handle, "timeout scheduled");
        handle
    }

    /// Schedules `callback` to run after `delay`.
    pub fn call_later<F>(&self, delay: Duration, callback: F) -> TimeoutHandle
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.add_timeout(self.time() + delay, callback)
    }

    /// Cancels a pending timeout. Returns `false` if it already fired.
    pub fn remove_timeout(&self, handle: TimeoutHandle) -> bool {
        self.inner.timers.borrow_mut().cancel(handle)
    }

    /// Returns a future that resolves with `None` after `delay`.
    pub fn sleep(&self, delay: Duration) -> Future {
        let future = Future::new();
        let resolve = future.clone();
        self.call_later(delay, move || resolve.set_result(Value::None));
        future
    }

    /// Asks a running loop to return after the current callback.
    pub fn stop(&self) {
        self.inner.queue.stop();
    }

    /// Returns `true` while inside [`IoLoop::run`].
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Runs callbacks and timers until stopped or out of work.
    ///
    /// With [`UnhandledPolicy::Stop`], the first error that no exception
    /// handler claimed stops the loop and is returned.
    ///
    /// # Panics
    /// Panics if the loop is already running.
    pub fn run(&self) -> Result<()> {
        if self.inner.running.replace(true) {
            panic!("IoLoop::run() called while the loop is already running");
        }

        self.inner.queue.reset();
        enter_loop(self.clone(), || self.run_until_idle());
        self.inner.running.set(false);

        match self.inner.unhandled.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_until_idle(&self) {
        let queue = &self.inner.queue;

        loop {
            let expired = self.inner.timers.borrow_mut().take_expired(self.time());
            for scheduled in expired {
                queue.push(scheduled);
            }

            // Callbacks scheduled during this pass wait for the next one.
            let ready = queue.len();
            for _ in 0..ready {
                if queue.is_stopped() {
                    return;
                }
                let Some(scheduled) = queue.pop() else {
                    break;
                };
                scheduled.run();
            }

            if queue.is_stopped() {
                return;
            }

            if !queue.is_empty() {
                continue;
            }

            // Only timers remain: sleep until the nearest deadline.
            let remaining = self.inner.timers.borrow().next_remaining(self.time());
            match remaining {
                Some(dur) => {
                    if !dur.is_zero() {
                        std::thread::sleep(dur.min(self.inner.max_idle_sleep));
                    }
                }
                None => {
                    tracing::trace!("IoLoop idle");
                    return;
                }
            }
        }
    }

    /// Records an error that escaped every exception handler.
    pub(crate) fn report_unhandled(&self, err: Error) {
        tracing::error!(error = %err, "Uncaught exception");

        if self.inner.policy != UnhandledPolicy::Stop {
            return;
        }

        let mut unhandled = self.inner.unhandled.borrow_mut();
        if unhandled.is_none() {
            *unhandled = Some(err);
            self.stop();
        }
    }

    /// Starts a value-producing computation on the loop and runs until it settles.
    ///
    /// # Example
    /// ```
    /// use genloop::{IoLoop, Value};
    ///
    /// let io_loop = IoLoop::new();
    /// let value = io_loop.run_sync(|_co| async move { Ok(42) }).unwrap();
    /// assert_eq!(value, Value::Int(42));
    /// ```
    pub fn run_sync<F, Fut, R>(&self, body: F) -> Result<Value>
    where
        F: FnOnce(Co) -> Fut + 'static,
        Fut: std::future::Future<Output = Result<R>> + 'static,
        R: Into<Value> + 'static,
    {
        let slot: Rc<RefCell<Option<Future>>> = Rc::new(RefCell::new(None));

        let io_loop = self.clone();
        let store = slot.clone();
        self.add_callback(move || {
            let future = coro::coroutine(body);
            *store.borrow_mut() = Some(future.clone());
            future.add_done_callback(move |_| {
                io_loop.stop();
                Ok(())
            })
        });

        self.run()?;

        let future = slot.borrow_mut().take();
        match future {
            Some(future) if future.done() => future.result(),
            _ => Err(GenError::Unfinished.into()),
        }
    }
}

impl Default for IoLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IoLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoLoop")
            .field("running", &self.inner.running.get())
            .field("pending_callbacks", &self.inner.queue.len())
            .field("has_timers", &!self.inner.timers.borrow().is_empty())
            .finish()
    }
}
