//! Thread-local runtime context and exception routing.
//!
//! This module manages the thread-local state that lets deferred work find
//! its way home:
//!
//! - the [`IoLoop`] currently running on this thread
//! - the [`ExceptionContext`] currently in effect
//!
//! # Exception routing
//!
//! Callbacks scheduled on the loop run long after the code that scheduled them
//! has returned, so a failure they raise cannot simply unwind to its logical
//! owner. Instead every deferred callback captures the context that was current
//! when it was created. When it fails, the error is offered to that context's
//! handler, then to each parent in turn. An error nobody claims is reported to
//! the running loop as unhandled.
//!
//! Contexts are explicit handles passed along with the callbacks, not ambient
//! state that accumulates: entering a context replaces the current one for the
//! duration of a closure and restores the previous one afterwards. A resumed
//! computation always re-enters its own context, so the chain seen by any
//! piece of code is bounded by how deeply computations were started, not by
//! how many times they suspended.
//!
//! # Example
//!
//! ```
//! use genloop::runtime::context::{self, ExceptionContext, ExceptionHandler};
//! use genloop::Result;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! struct Swallow(Cell<usize>);
//!
//! impl ExceptionHandler for Swallow {
//!     fn handle_exception(&self, _err: genloop::Error) -> Result<()> {
//!         self.0.set(self.0.get() + 1);
//!         Ok(())
//!     }
//! }
//!
//! let handler = Rc::new(Swallow(Cell::new(0)));
//! let ctx = ExceptionContext::new(handler.clone());
//! context::route(Some(&ctx), anyhow::anyhow!("boom"));
//! assert_eq!(handler.0.get(), 1);
//! ```

use crate::error::{Error, Result};
use crate::runtime::IoLoop;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Receives failures routed to an [`ExceptionContext`].
pub trait ExceptionHandler {
    /// Handles `err`, or hands it back to pass it on to the parent context.
    fn handle_exception(&self, err: Error) -> Result<()>;
}

enum HandlerRef {
    Strong(Rc<dyn ExceptionHandler>),
    Weak(Weak<dyn ExceptionHandler>),
}

struct Node {
    handler: HandlerRef,
    parent: Option<ExceptionContext>,
    depth: usize,
}

/// A link in the chain of exception handlers.
#[derive(Clone)]
pub struct ExceptionContext(Rc<Node>);

impl ExceptionContext {
    /// Creates a context owning `handler`, nested under the current context.
    pub fn new(handler: Rc<dyn ExceptionHandler>) -> Self {
        Self::with_ref(HandlerRef::Strong(handler))
    }

    /// Creates a context that only holds `handler` weakly.
    ///
    /// Once the handler is dropped, errors pass straight through to the parent.
    pub fn new_weak(handler: Weak<dyn ExceptionHandler>) -> Self {
        Self::with_ref(HandlerRef::Weak(handler))
    }

    fn with_ref(handler: HandlerRef) -> Self {
        let parent = current();
        let depth = parent.as_ref().map_or(0, ExceptionContext::depth) + 1;

        Self(Rc::new(Node {
            handler,
            parent,
            depth,
        }))
    }

    /// Number of contexts in the chain ending at this one.
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn parent(&self) -> Option<&ExceptionContext> {
        self.0.parent.as_ref()
    }

    fn handler(&self) -> Option<Rc<dyn ExceptionHandler>> {
        match &self.0.handler {
            HandlerRef::Strong(handler) => Some(handler.clone()),
            HandlerRef::Weak(handler) => handler.upgrade(),
        }
    }

    /// Returns `true` if both handles refer to the same context.
    pub fn ptr_eq(&self, other: &ExceptionContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ExceptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionContext")
            .field("depth", &self.0.depth)
            .finish_non_exhaustive()
    }
}

thread_local! {
    /// Exception context in effect for code running on this thread.
    static CURRENT_CONTEXT: RefCell<Option<ExceptionContext>> = const { RefCell::new(None) };

    /// Event loop currently inside [`IoLoop::run`] on this thread.
    static CURRENT_LOOP: RefCell<Option<IoLoop>> = const { RefCell::new(None) };
}

/// Returns the exception context currently in effect.
pub fn current() -> Option<ExceptionContext> {
    CURRENT_CONTEXT.with(|current| current.borrow().clone())
}

/// Length of the current context chain, `0` outside of any context.
pub fn depth() -> usize {
    current().as_ref().map_or(0, ExceptionContext::depth)
}

// Restores the previous value of a thread-local slot on drop, unwinding included.
struct Restore<T: 'static> {
    key: &'static std::thread::LocalKey<RefCell<Option<T>>>,
    previous: Option<Option<T>>,
}

impl<T: 'static> Drop for Restore<T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.key.with(|slot| *slot.borrow_mut() = previous);
        }
    }
}

fn swap_in<T: 'static>(
    key: &'static std::thread::LocalKey<RefCell<Option<T>>>,
    value: Option<T>,
) -> Restore<T> {
    let previous = key.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), value));
    Restore {
        key,
        previous: Some(previous),
    }
}

/// Runs `function` with `context` as the current exception context.
///
/// The previous context is restored on exit.
pub fn enter<F, R>(context: Option<ExceptionContext>, function: F) -> R
where
    F: FnOnce() -> R,
{
    let _restore = swap_in(&CURRENT_CONTEXT, context);
    function()
}

/// Offers `err` to `context` and its parents, innermost first.
///
/// An error that no handler claims is reported as unhandled.
pub fn route(context: Option<&ExceptionContext>, err: Error) {
    let mut err = err;
    let mut next = context.cloned();

    while let Some(ctx) = next {
        if let Some(handler) = ctx.handler() {
            match handler.handle_exception(err) {
                Ok(()) => return,
                Err(unhandled) => err = unhandled,
            }
        }
        next = ctx.parent().cloned();
    }

    report_unhandled(err);
}

/// Hands an error that escaped every handler to the running loop.
pub(crate) fn report_unhandled(err: Error) {
    match current_loop() {
        Some(io_loop) => io_loop.report_unhandled(err),
        None => tracing::error!(error = %err, "Uncaught exception outside of a running IoLoop"),
    }
}

/// Runs `function` with `io_loop` installed as the current loop.
pub(crate) fn enter_loop<F, R>(io_loop: IoLoop, function: F) -> R
where
    F: FnOnce() -> R,
{
    let _restore = swap_in(&CURRENT_LOOP, Some(io_loop));
    function()
}

/// Returns the loop currently running on this thread.
pub(crate) fn current_loop() -> Option<IoLoop> {
    CURRENT_LOOP.with(|current| current.borrow().clone())
}
