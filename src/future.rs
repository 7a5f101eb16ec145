//! One-shot result containers and the callbacks that settle them.
//!
//! A [`Future`] starts pending and is settled exactly once, either with a
//! [`Value`] or with an [`Error`]. It is a shared handle: the producer keeps
//! one clone to settle it, the consumer keeps another to observe it. There is
//! no back-reference to whoever is waiting.
//!
//! Done-callbacks run synchronously on the settling call stack. Whatever they
//! return is handed back to the settler, so a failure raised while reacting to
//! a result surfaces where the result was delivered.
//!
//! # Example
//!
//! ```
//! use genloop::Future;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let future = Future::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! let s = seen.clone();
//! future
//!     .add_done_callback(move |f| {
//!         s.set(f.result()?.as_int().unwrap_or_default());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! future.set_result(7).unwrap();
//! assert_eq!(seen.get(), 7);
//! ```

use crate::arguments::Arguments;
use crate::error::{Error, GenError, Result};
use crate::runtime::context::{self, ExceptionContext};
use crate::value::Value;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type DoneCallback = Box<dyn FnOnce(&Future) -> Result<()>>;
type Waiters = RefCell<Vec<DoneCallback>>;

enum State {
    Pending,
    Resolved(Value),
    Failed(Error),
    Consumed,
}

/// A one-shot container for an eventual value or failure.
///
/// Every handle owns the done-callbacks. Once the last handle is gone nothing
/// can settle the future anymore, and whatever its callbacks captured is
/// released with them.
#[derive(Clone)]
pub struct Future {
    state: Rc<RefCell<State>>,
    waiters: Rc<Waiters>,
}

impl Future {
    /// Creates a pending future.
    pub fn new() -> Self {
        Self::with_state(State::Pending)
    }

    /// Creates a future that is already resolved with `value`.
    pub fn resolved(value: impl Into<Value>) -> Self {
        Self::with_state(State::Resolved(value.into()))
    }

    /// Creates a future that has already failed with `error`.
    pub fn failed_with(error: impl Into<Error>) -> Self {
        Self::with_state(State::Failed(error.into()))
    }

    fn with_state(state: State) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
            waiters: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Returns `true` once the future has been settled.
    pub fn done(&self) -> bool {
        !matches!(*self.state.borrow(), State::Pending)
    }

    /// Returns `true` if the future settled with a failure that has not been read yet.
    pub fn failed(&self) -> bool {
        matches!(*self.state.borrow(), State::Failed(_))
    }

    /// A handle that observes the outcome without being able to keep the
    /// future settleable.
    pub(crate) fn watch(&self) -> Watch {
        Watch {
            state: self.state.clone(),
            waiters: Rc::downgrade(&self.waiters),
        }
    }

    /// Resolves the future and runs its done-callbacks.
    ///
    /// Returns the first error raised by a done-callback.
    ///
    /// # Panics
    /// Panics if the future was already settled.
    pub fn set_result(&self, value: impl Into<Value>) -> Result<()> {
        self.settle(State::Resolved(value.into()))
    }

    /// Fails the future and runs its done-callbacks.
    ///
    /// # Panics
    /// Panics if the future was already settled.
    pub fn set_exception(&self, error: impl Into<Error>) -> Result<()> {
        self.settle(State::Failed(error.into()))
    }

    fn settle(&self, state: State) -> Result<()> {
        {
            let mut current = self.state.borrow_mut();
            if !matches!(*current, State::Pending) {
                panic!("Future settled more than once");
            }
            *current = state;
        }
        let callbacks = std::mem::take(&mut *self.waiters.borrow_mut());

        let mut outcome = Ok(());
        for callback in callbacks {
            if let Err(err) = callback(self) {
                if outcome.is_ok() {
                    outcome = Err(err);
                } else {
                    tracing::error!(error = %err, "done-callback failed after an earlier failure");
                }
            }
        }
        outcome
    }

    /// Registers interest in the outcome.
    ///
    /// If the future is already settled, `callback` runs immediately on this
    /// call stack and its result is returned. Otherwise it is stored and runs
    /// when the future settles.
    pub fn add_done_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Future) -> Result<()> + 'static,
    {
        if self.done() {
            return callback(self);
        }

        self.waiters.borrow_mut().push(Box::new(callback));
        Ok(())
    }

    /// Takes the settled outcome out of the future.
    ///
    /// # Panics
    /// Panics if the future is still pending or its outcome was already taken.
    pub fn result(&self) -> Result<Value> {
        let state = std::mem::replace(&mut *self.state.borrow_mut(), State::Consumed);

        match state {
            State::Resolved(value) => Ok(value),
            State::Failed(err) => Err(err),
            State::Pending => panic!("result() called on a pending Future"),
            State::Consumed => panic!("result() called twice on the same Future"),
        }
    }

    /// Copies the resolved value out without consuming it.
    ///
    /// Returns `None` while pending, after a failure, or once consumed.
    pub fn peek(&self) -> Option<Value> {
        match &*self.state.borrow() {
            State::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl Default for Future {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            State::Pending => "pending",
            State::Resolved(_) => "resolved",
            State::Failed(_) => "failed",
            State::Consumed => "consumed",
        };
        f.debug_struct("Future").field("state", &state).finish()
    }
}

/// Read side of a [`Future`] held by whoever waits on it.
///
/// A watch does not own the done-callbacks: subscribing through it after every
/// [`Future`] handle is gone drops the subscriber, since nothing is left that
/// could settle the future.
#[derive(Clone)]
pub(crate) struct Watch {
    state: Rc<RefCell<State>>,
    waiters: Weak<Waiters>,
}

impl Watch {
    pub(crate) fn done(&self) -> bool {
        !matches!(*self.state.borrow(), State::Pending)
    }

    /// Calls `notify` once the future settles, with whether it failed.
    pub(crate) fn on_settled<F>(&self, notify: F) -> Result<()>
    where
        F: FnOnce(bool) -> Result<()> + 'static,
    {
        if self.done() {
            let failed = matches!(*self.state.borrow(), State::Failed(_));
            return notify(failed);
        }

        match self.waiters.upgrade() {
            Some(waiters) => {
                waiters
                    .borrow_mut()
                    .push(Box::new(move |future: &Future| notify(future.failed())));
            }
            None => tracing::trace!("future can no longer settle, subscriber dropped"),
        }
        Ok(())
    }

    /// Reads the outcome for a waiter.
    ///
    /// A value is cloned and left in place; a failure is taken, so a second
    /// read of the same failed future yields [`GenError::OutcomeTaken`].
    pub(crate) fn outcome(&self) -> Result<Value> {
        let mut state = self.state.borrow_mut();
        match &*state {
            State::Resolved(value) => return Ok(value.clone()),
            State::Pending => return Err(GenError::OutcomeTaken.into()),
            State::Failed(_) | State::Consumed => {}
        }

        match std::mem::replace(&mut *state, State::Consumed) {
            State::Failed(err) => Err(err),
            _ => Err(GenError::OutcomeTaken.into()),
        }
    }
}

/// A completion callback bound to one [`Future`].
///
/// Calling it captures the payload (see [`Arguments::capture`]) and resolves
/// the future. The callback remembers the exception context that was current
/// when it was created; the resolution runs inside that context and any
/// failure it raises is routed there, no matter where the callback is
/// eventually invoked from.
///
/// A callback is consumed when called, so it fires at most once.
pub struct Callback {
    future: Future,
    context: Option<ExceptionContext>,
}

impl Callback {
    pub(crate) fn new(future: Future) -> Self {
        Self {
            future,
            context: context::current(),
        }
    }

    /// Fires the callback with an arbitrary payload.
    pub fn call(self, arguments: Arguments) {
        if self.future.done() {
            tracing::warn!("callback fired for a future that is already settled");
            return;
        }

        let outcome = arguments.capture();
        let result = context::enter(self.context.clone(), || self.future.set_result(outcome));

        if let Err(err) = result {
            context::route(self.context.as_ref(), err);
        }
    }

    /// Fires the callback with a single value.
    pub fn call_with(self, value: impl Into<Value>) {
        self.call(Arguments::one(value));
    }

    /// Fires the callback with no payload.
    pub fn notify(self) {
        self.call(Arguments::none());
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("future", &self.future)
            .finish_non_exhaustive()
    }
}

/// Adapts a callback-style operation into one that returns a [`Future`].
///
/// `operation` receives the completion callback. If it fails before the
/// callback fires, the failure becomes the future's failure; a failure after
/// that point is routed through the current exception context.
pub fn return_future<F>(operation: F) -> Future
where
    F: FnOnce(Callback) -> Result<()>,
{
    let future = Future::new();

    if let Err(err) = operation(Callback::new(future.clone())) {
        let current = context::current();
        if future.done() {
            context::route(current.as_ref(), err);
        } else if let Err(err) = future.set_exception(err) {
            context::route(current.as_ref(), err);
        }
    }

    future
}
