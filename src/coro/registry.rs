//! Keyed callback slots owned by one computation.
//!
//! Registering a key hands out a [`Callback`] bound to a fresh [`Future`]. The
//! slot lives until a wait on the same key consumes its outcome. Every key is
//! claimed by exactly one producer and consumed by exactly one waiter; whatever
//! is still registered when the computation ends has leaked.
//!
//! The registry only watches its slots. The [`Callback`] is what keeps a slot
//! settleable, so dropping it unfired also drops every waiter subscribed to it.

use crate::error::{GenError, Result};
use crate::future::{Callback, Future, Watch};
use crate::value::{Key, Value};

use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct Registry {
    slots: HashMap<Key, Watch>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Opens a slot for `key` and returns the callback that fills it.
    pub(crate) fn register(&mut self, key: Key) -> Result<Callback, GenError> {
        if self.slots.contains_key(&key) {
            return Err(GenError::KeyReuse(key));
        }

        tracing::debug!(%key, "callback registered");
        let future = Future::new();
        self.slots.insert(key, future.watch());
        Ok(Callback::new(future))
    }

    /// Returns the watch on a pending slot.
    pub(crate) fn lookup(&self, key: &Key) -> Result<Watch, GenError> {
        self.slots
            .get(key)
            .cloned()
            .ok_or_else(|| GenError::UnknownKey(key.clone()))
    }

    /// Returns `true` once the callback for `key` has fired.
    pub(crate) fn is_ready(&self, key: &Key) -> bool {
        self.slots.get(key).is_some_and(Watch::done)
    }

    /// Deletes the slot for `key` and returns its outcome.
    pub(crate) fn pop_result(&mut self, key: &Key) -> Result<Value> {
        let watch = self
            .slots
            .remove(key)
            .ok_or_else(|| GenError::UnknownKey(key.clone()))?;
        watch.outcome()
    }

    /// Empties the registry, returning the keys that were never consumed.
    pub(crate) fn drain_leaked(&mut self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.slots.drain().map(|(key, _)| key).collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
