//! The driver that steps one computation from yield point to yield point.
//!
//! A computation is an `async` body that only ever awaits [`Suspend`] values.
//! Each `Suspend` hands its yield point to the runner on first poll and
//! returns `Pending`; the runner then begins the point and either feeds the
//! outcome straight back (fast path) or subscribes to its completion and
//! returns control to the caller. Already-settled points are handled in a
//! plain loop, so a long chain of them never deepens the call stack.
//!
//! The body is polled with a no-op waker: progress is driven exclusively by
//! yield point completions, never by wakers.
//!
//! [`Suspend`]: crate::coro::Suspend

use crate::error::{Error, GenError, Result};
use crate::future::Callback;
use crate::coro::registry::Registry;
use crate::coro::yield_point::{Started, Yielded};
use crate::coro::Co;
use crate::runtime::context::{self, ExceptionContext};
use crate::value::{Key, Value};

use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;

use std::cell::{Cell, RefCell};
use std::future::Future as StdFuture;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Receives the terminal outcome of a computation.
pub(crate) type FinalCallback = Box<dyn FnOnce(Result<Value>) -> Result<()>>;

pub(crate) struct Runner {
    body: RefCell<Option<LocalBoxFuture<'static, Result<Value>>>>,
    offered: RefCell<Option<Yielded>>,
    overlapped: Cell<bool>,
    sent: RefCell<Option<Result<Value>>>,
    pending: RefCell<Option<Started>>,
    pub(crate) registry: RefCell<Registry>,
    exc: RefCell<Option<Error>>,
    running: Cell<bool>,
    finished: Cell<bool>,
    had_exception: Cell<bool>,
    epoch: Cell<u64>,
    task_ids: Cell<u64>,
    final_callback: RefCell<Option<FinalCallback>>,
    context: RefCell<Option<ExceptionContext>>,
}

fn into_value_future<Fut, R>(body: Fut) -> LocalBoxFuture<'static, Result<Value>>
where
    Fut: StdFuture<Output = Result<R>> + 'static,
    R: Into<Value> + 'static,
{
    Box::pin(async move { body.await.map(Into::into) })
}

impl Runner {
    pub(crate) fn new(final_callback: FinalCallback) -> Rc<Self> {
        Rc::new(Self {
            body: RefCell::new(None),
            offered: RefCell::new(None),
            overlapped: Cell::new(false),
            sent: RefCell::new(None),
            pending: RefCell::new(None),
            registry: RefCell::new(Registry::new()),
            exc: RefCell::new(None),
            running: Cell::new(false),
            finished: Cell::new(false),
            had_exception: Cell::new(false),
            epoch: Cell::new(0),
            task_ids: Cell::new(0),
            final_callback: RefCell::new(Some(final_callback)),
            context: RefCell::new(None),
        })
    }

    /// Builds the body inside `context` and drives it to its first suspension.
    pub(crate) fn start<F, Fut, R>(self: &Rc<Self>, context: ExceptionContext, body: F) -> Result<()>
    where
        F: FnOnce(Co) -> Fut,
        Fut: StdFuture<Output = Result<R>> + 'static,
        R: Into<Value> + 'static,
    {
        *self.context.borrow_mut() = Some(context.clone());

        let co = Co::new(Rc::downgrade(self));
        let body = context::enter(Some(context), || into_value_future(body(co)));
        *self.body.borrow_mut() = Some(body);

        self.run()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Stores the yield point a `Suspend` is handing over.
    pub(crate) fn offer(&self, yielded: Yielded) {
        let mut offered = self.offered.borrow_mut();
        if offered.is_some() {
            self.overlapped.set(true);
        } else {
            *offered = Some(yielded);
        }
    }

    /// Takes the outcome the runner is feeding back into the body.
    pub(crate) fn take_sent(&self) -> Option<Result<Value>> {
        self.sent.borrow_mut().take()
    }

    pub(crate) fn register(&self, key: Key) -> Result<Callback> {
        if self.finished.get() {
            return Err(GenError::Finished.into());
        }
        Ok(self.registry.borrow_mut().register(key)?)
    }

    pub(crate) fn next_task_key(&self) -> Key {
        let id = self.task_ids.get();
        self.task_ids.set(id + 1);
        Key::task(id)
    }

    /// Advances the computation until it suspends on an unsettled point or ends.
    ///
    /// Returns the terminal error when the computation ends in one and the
    /// final callback does not absorb it.
    pub(crate) fn run(self: &Rc<Self>) -> Result<()> {
        if self.running.get() || self.finished.get() {
            return Ok(());
        }

        let context = self.context.borrow().clone();
        context::enter(context, || {
            self.running.set(true);
            let outcome = self.drive();
            self.running.set(false);
            outcome
        })
    }

    fn drive(self: &Rc<Self>) -> Result<()> {
        loop {
            let Some(send) = self.next_input() else {
                return Ok(());
            };

            if send.is_err() {
                self.had_exception.set(true);
            }

            *self.sent.borrow_mut() = Some(send);
            let step = self.poll_body();
            self.sent.borrow_mut().take();

            if let Poll::Ready(outcome) = step {
                return self.finish(outcome);
            }

            let offered = self.offered.borrow_mut().take();
            if self.overlapped.replace(false) {
                return self.finish(Err(GenError::BadYield(
                    "more than one yield point outstanding".into(),
                )
                .into()));
            }

            let point = match offered {
                Some(Yielded::Point(point)) => point,
                Some(Yielded::Unrecognized(value)) => {
                    return self.finish(Err(GenError::BadYield(value.to_string()).into()));
                }
                None => {
                    return self.finish(Err(GenError::BadYield(
                        "suspended without a yield point".into(),
                    )
                    .into()));
                }
            };

            let epoch = self.epoch.get() + 1;
            self.epoch.set(epoch);
            tracing::trace!(epoch, "yield point reached");

            match point.begin(self) {
                Ok(started) => *self.pending.borrow_mut() = Some(started),
                Err(err) => *self.exc.borrow_mut() = Some(err),
            }
        }
    }

    // Picks what to feed the body next: a routed error, a settled outcome, or
    // `None` when the pending point has to be waited for.
    fn next_input(self: &Rc<Self>) -> Option<Result<Value>> {
        let exc = self.exc.borrow_mut().take();
        if let Some(err) = exc {
            return Some(Err(err));
        }

        let point = self.pending.borrow_mut().take();
        let Some(point) = point else {
            return Some(Ok(Value::None));
        };

        if !point.is_ready(self) {
            // The subscription is what keeps a parked computation alive. It is
            // owned by whoever can still settle the point.
            let runner = Rc::clone(self);
            let epoch = self.epoch.get();
            let resume = move |_: bool| {
                runner.resume(epoch);
                Ok(())
            };
            if let Err(err) = point.subscribe(self, Box::new(resume)) {
                return Some(Err(err));
            }

            if !point.is_ready(self) {
                tracing::trace!(epoch, "suspended");
                *self.pending.borrow_mut() = Some(point);
                return None;
            }
        }

        Some(point.get_result(self))
    }

    fn poll_body(&self) -> Poll<Result<Value>> {
        let mut body = self.body.borrow_mut();
        let Some(body) = body.as_mut() else {
            return Poll::Ready(Err(GenError::Finished.into()));
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        body.as_mut().poll(&mut cx)
    }

    /// Continues after the pending point settled.
    ///
    /// A terminal failure is routed through this computation's own context,
    /// never handed to whoever settled the point.
    fn resume(self: &Rc<Self>, epoch: u64) {
        if self.finished.get() {
            tracing::debug!(epoch, "completion arrived after the computation finished");
            return;
        }

        if epoch != self.epoch.get() {
            tracing::trace!(epoch, current = self.epoch.get(), "stale completion ignored");
            return;
        }

        if let Err(err) = self.run() {
            let context = self.context.borrow().clone();
            context::route(context.as_ref(), err);
        }
    }

    /// Throws a routed error into the computation at its current yield point.
    ///
    /// Hands the error back if the computation cannot take it: it is running
    /// right now, or it already finished.
    pub(crate) fn handle_exception(self: &Rc<Self>, err: Error) -> Result<()> {
        if self.running.get() || self.finished.get() {
            return Err(err);
        }

        tracing::debug!(error = %err, "error routed into suspended computation");
        self.pending.borrow_mut().take();
        self.epoch.set(self.epoch.get() + 1);
        *self.exc.borrow_mut() = Some(err);

        self.run()
    }

    fn finish(&self, outcome: Result<Value>) -> Result<()> {
        self.finished.set(true);

        let body = self.body.borrow_mut().take();
        drop(body);
        self.pending.borrow_mut().take();
        self.offered.borrow_mut().take();

        let leaked = self.registry.borrow_mut().drain_leaked();
        let outcome = match outcome {
            Ok(_) if !leaked.is_empty() && !self.had_exception.get() => {
                Err(GenError::LeakedCallback(leaked).into())
            }
            outcome => {
                if !leaked.is_empty() {
                    tracing::debug!(count = leaked.len(), "dropping callbacks abandoned after an error");
                }
                outcome
            }
        };

        match &outcome {
            Ok(value) => tracing::trace!(%value, "computation finished"),
            Err(err) => tracing::debug!(error = %err, "computation failed"),
        }

        let final_callback = self.final_callback.borrow_mut().take();
        match final_callback {
            Some(final_callback) => final_callback(outcome),
            None => outcome.map(drop),
        }
    }
}
