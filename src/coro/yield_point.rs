//! Everything a computation can suspend on.
//!
//! A [`YieldPoint`] is only a description. When the computation reaches it the
//! runner calls `begin`, which does the registrations and fan-out and turns it
//! into a [`Started`] point. From then on the runner:
//!
//! 1. checks `is_ready` to take the synchronous fast path when the outcome is known
//! 2. calls `subscribe` to be told when it settles otherwise
//! 3. calls `get_result` exactly once to read the outcome
//!
//! A started point only observes futures through [`Watch`]es, so a computation
//! parked on something nobody can settle anymore holds nothing that keeps it
//! alive.
//!
//! Parallel points ([`WaitAll`] and lists) fan out to their parts in `begin`
//! and count settlements down with a shared [`Countdown`], so each part
//! settling costs O(1) regardless of how many siblings it has.

use crate::error::{Error, GenError, Result};
use crate::future::{Callback, Future, Watch};
use crate::coro::runner::Runner;
use crate::value::{Key, Value};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Called once a yield point settles; the flag tells whether a part failed.
pub(crate) type Notify = Box<dyn FnOnce(bool) -> Result<()>>;

/// Waits for the callback registered under a key.
#[derive(Debug, Clone)]
pub struct Wait {
    key: Key,
}

impl Wait {
    /// Creates a wait on the callback registered under `key`.
    pub fn new(key: impl Into<Key>) -> Self {
        Self { key: key.into() }
    }

    /// The key this wait consumes.
    pub fn key(&self) -> &Key {
        &self.key
    }
}

/// Waits for several keys, yielding their outcomes as a list in key order.
#[derive(Debug, Clone)]
pub struct WaitAll {
    keys: Vec<Key>,
}

impl WaitAll {
    /// Creates a wait on every key in `keys`, in that order.
    pub fn new<I>(keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

type Operation = Box<dyn FnOnce(Callback) -> Result<()>>;

/// Runs a callback-style operation and waits for it to call back.
///
/// The operation receives a [`Callback`] registered under a key private to the
/// computation. It is called once, when the task begins, and dropped right
/// after, so nothing it captured outlives the call.
///
/// ```
/// use genloop::coro::{engine, Task};
/// use genloop::Value;
///
/// engine(|co| async move {
///     let value = co.suspend(Task::new(|callback| {
///         callback.call_with(3);
///         Ok(())
///     })).await?;
///     assert_eq!(value, Value::Int(3));
///     Ok(())
/// })
/// .unwrap();
/// ```
pub struct Task {
    operation: Operation,
}

impl Task {
    /// Wraps `operation`, which is handed the completion callback on begin.
    pub fn new<F>(operation: F) -> Self
    where
        F: FnOnce(Callback) -> Result<()> + 'static,
    {
        Self {
            operation: Box::new(operation),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Waits for every child in parallel, yielding a list in input order.
pub struct Multi {
    children: Vec<YieldPoint>,
}

impl Multi {
    /// Groups `children` into one parallel wait.
    pub fn new<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<YieldPoint>,
    {
        Self {
            children: children.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Debug for Multi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multi")
            .field("children", &self.children.len())
            .finish()
    }
}

/// Settlement count of a group, shared by the group and its [`Countdown`].
pub(crate) struct Tally {
    remaining: Cell<usize>,
    first_failure: Cell<Option<usize>>,
}

impl Tally {
    fn is_done(&self) -> bool {
        self.remaining.get() == 0
    }

    fn failed(&self) -> bool {
        self.first_failure.get().is_some()
    }
}

/// Counts the settlements of a group of parts down to zero.
///
/// Only the parts' subscriptions own it, so it disappears together with the
/// last part that could still settle.
pub(crate) struct Countdown {
    tally: Rc<Tally>,
    notify: RefCell<Option<Notify>>,
}

impl Countdown {
    fn new(parts: usize) -> Rc<Self> {
        let tally = Tally {
            remaining: Cell::new(parts),
            first_failure: Cell::new(None),
        };
        Rc::new(Self {
            tally: Rc::new(tally),
            notify: RefCell::new(None),
        })
    }

    fn tick(&self, index: usize, failed: bool) -> Result<()> {
        let tally = &self.tally;
        if failed && tally.first_failure.get().is_none() {
            tally.first_failure.set(Some(index));
        }

        let remaining = tally.remaining.get().saturating_sub(1);
        tally.remaining.set(remaining);

        if remaining == 0 {
            let notify = self.notify.borrow_mut().take();
            if let Some(notify) = notify {
                return notify(tally.failed());
            }
        }

        Ok(())
    }
}

/// A suspension descriptor the runner knows how to drive.
#[derive(Debug)]
pub enum YieldPoint {
    Future(Future),
    Wait(Wait),
    WaitAll(WaitAll),
    Multi(Multi),
    Task(Task),
}

impl YieldPoint {
    pub(crate) fn begin(self, runner: &Runner) -> Result<Started> {
        match self {
            YieldPoint::Future(future) => Ok(Started::Future(future.watch())),
            YieldPoint::Wait(wait) => {
                runner.registry.borrow().lookup(&wait.key)?;
                Ok(Started::Key(wait.key))
            }
            YieldPoint::WaitAll(wait_all) => {
                let parts = {
                    let registry = runner.registry.borrow();
                    wait_all
                        .keys
                        .into_iter()
                        .map(|key| registry.lookup(&key).map(|_| Started::Key(key)))
                        .collect::<Result<Vec<_>, GenError>>()?
                };
                Started::group(parts, runner)
            }
            YieldPoint::Multi(multi) => {
                let parts = multi
                    .children
                    .into_iter()
                    .map(|child| child.begin(runner))
                    .collect::<Result<Vec<_>>>()?;
                Started::group(parts, runner)
            }
            YieldPoint::Task(task) => {
                let key = runner.next_task_key();
                let callback = runner.register(key.clone())?;
                (task.operation)(callback)?;
                Ok(Started::Key(key))
            }
        }
    }
}

/// A yield point that has begun and is waiting to settle.
pub(crate) enum Started {
    Future(Watch),
    /// A registry slot, from [`Wait`] or [`Task`].
    Key(Key),
    Group {
        parts: Vec<Started>,
        tally: Rc<Tally>,
        countdown: Weak<Countdown>,
    },
}

impl Started {
    fn group(parts: Vec<Started>, runner: &Runner) -> Result<Started> {
        let countdown = Countdown::new(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let countdown = countdown.clone();
            part.subscribe(runner, Box::new(move |failed: bool| countdown.tick(index, failed)))?;
        }

        Ok(Started::Group {
            parts,
            tally: countdown.tally.clone(),
            countdown: Rc::downgrade(&countdown),
        })
    }

    pub(crate) fn is_ready(&self, runner: &Runner) -> bool {
        match self {
            Started::Future(watch) => watch.done(),
            Started::Key(key) => runner.registry.borrow().is_ready(key),
            Started::Group { tally, .. } => tally.is_done(),
        }
    }

    pub(crate) fn subscribe(&self, runner: &Runner, notify: Notify) -> Result<()> {
        match self {
            Started::Future(watch) => watch.on_settled(notify),
            Started::Key(key) => {
                let watch = runner.registry.borrow().lookup(key)?;
                watch.on_settled(notify)
            }
            Started::Group {
                tally, countdown, ..
            } => {
                if tally.is_done() {
                    return notify(tally.failed());
                }
                match countdown.upgrade() {
                    Some(countdown) => *countdown.notify.borrow_mut() = Some(notify),
                    None => tracing::trace!("no part of the group can settle anymore"),
                }
                Ok(())
            }
        }
    }

    pub(crate) fn get_result(self, runner: &Runner) -> Result<Value> {
        match self {
            Started::Future(watch) => watch.outcome(),
            Started::Key(key) => runner.registry.borrow_mut().pop_result(&key),
            Started::Group { parts, tally, .. } => {
                let mut values = Vec::with_capacity(parts.len());
                let mut failures: Vec<(usize, Error)> = Vec::new();
                for (index, part) in parts.into_iter().enumerate() {
                    match part.get_result(runner) {
                        Ok(value) => values.push(value),
                        Err(err) => failures.push((index, err)),
                    }
                }

                if failures.is_empty() {
                    return Ok(Value::List(values));
                }

                // A repeated failed future only holds its error in the first
                // copy, which also settled first.
                let pick = tally
                    .first_failure
                    .get()
                    .and_then(|first| failures.iter().position(|(index, _)| *index == first))
                    .unwrap_or(0);
                let (_, err) = failures.swap_remove(pick);
                if !failures.is_empty() {
                    tracing::debug!(discarded = failures.len(), "parallel wait had further failures");
                }
                Err(err)
            }
        }
    }
}

impl From<Future> for YieldPoint {
    fn from(future: Future) -> Self {
        YieldPoint::Future(future)
    }
}

impl From<Wait> for YieldPoint {
    fn from(wait: Wait) -> Self {
        YieldPoint::Wait(wait)
    }
}

impl From<WaitAll> for YieldPoint {
    fn from(wait_all: WaitAll) -> Self {
        YieldPoint::WaitAll(wait_all)
    }
}

impl From<Multi> for YieldPoint {
    fn from(multi: Multi) -> Self {
        YieldPoint::Multi(multi)
    }
}

impl From<Task> for YieldPoint {
    fn from(task: Task) -> Self {
        YieldPoint::Task(task)
    }
}

impl<T: Into<YieldPoint>> From<Vec<T>> for YieldPoint {
    fn from(children: Vec<T>) -> Self {
        YieldPoint::Multi(Multi::new(children))
    }
}

/// Whatever a computation hands to [`Co::suspend`](crate::coro::Co::suspend).
///
/// Plain values are accepted by the type system so that they can be rejected
/// by the runner with [`GenError::BadYield`].
#[derive(Debug)]
pub enum Yielded {
    Point(YieldPoint),
    Unrecognized(Value),
}

macro_rules! yieldable {
    ($($t:ty),*) => {
        $(impl From<$t> for Yielded {
            fn from(point: $t) -> Self {
                Yielded::Point(point.into())
            }
        })*
    };
}

yieldable!(YieldPoint, Future, Wait, WaitAll, Multi, Task);

impl<T: Into<YieldPoint>> From<Vec<T>> for Yielded {
    fn from(children: Vec<T>) -> Self {
        Yielded::Point(YieldPoint::from(children))
    }
}

impl From<Value> for Yielded {
    fn from(value: Value) -> Self {
        Yielded::Unrecognized(value)
    }
}
