//! FIFO queue of callbacks scheduled on the loop.
//!
//! Each entry remembers the exception context that was current when it was
//! scheduled so that a failure can be routed back to its owner when the
//! callback eventually runs.

use crate::error::Result;
use crate::runtime::context::{self, ExceptionContext};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// A deferred callback paired with the context it was scheduled from.
pub(crate) struct Scheduled {
    callback: Box<dyn FnOnce() -> Result<()>>,
    context: Option<ExceptionContext>,
}

impl Scheduled {
    /// Captures the current exception context alongside `callback`.
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        Self {
            callback: Box::new(callback),
            context: context::current(),
        }
    }

    /// Runs the callback inside its captured context, routing any failure there.
    pub(crate) fn run(self) {
        let Scheduled { callback, context } = self;
        let result = context::enter(context.clone(), callback);

        if let Err(err) = result {
            context::route(context.as_ref(), err);
        }
    }
}

/// A single-threaded FIFO queue of ready callbacks.
pub(crate) struct CallbackQueue {
    queue: RefCell<VecDeque<Scheduled>>,
    stopped: Cell<bool>,
}

impl CallbackQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            stopped: Cell::new(false),
        }
    }

    /// Enqueues a callback to run on a later loop iteration.
    pub(crate) fn push(&self, scheduled: Scheduled) {
        self.queue.borrow_mut().push_back(scheduled);
    }

    /// Dequeues the oldest ready callback.
    pub(crate) fn pop(&self) -> Option<Scheduled> {
        self.queue.borrow_mut().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Signals the loop to return after the current callback.
    pub(crate) fn stop(&self) {
        self.stopped.set(true);
    }

    /// Clears a previous stop request before the loop starts again.
    pub(crate) fn reset(&self) {
        self.stopped.set(false);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}
