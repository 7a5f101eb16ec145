//! Error definitions
//!
//! Application failures travel through the engine as [`Error`] (an
//! [`anyhow::Error`]) and are never wrapped, so callers can recover the
//! original type with `downcast_ref`. Failures detected by the engine itself
//! are [`GenError`] values inside that same [`Error`].

use crate::value::{Key, Value};

use thiserror::Error;

/// Any failure raised by user logic or by the engine.
pub type Error = anyhow::Error;

/// Result type alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structural failures detected by the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenError {
    /// A callback was registered for a key that is still pending.
    #[error("key {0} was already registered")]
    KeyReuse(Key),

    /// A wait was started on a key with no registered callback.
    #[error("key {0} is not pending")]
    UnknownKey(Key),

    /// The computation finished while callbacks were still registered.
    #[error("finished without waiting for callbacks {}", format_keys(.0))]
    LeakedCallback(Vec<Key>),

    /// The computation suspended on something that is not a yield point.
    #[error("yielded unknown object {0}")]
    BadYield(String),

    /// A fire-and-forget computation produced a value nobody can receive.
    #[error("engine computations cannot return values (got {0}); use coroutine instead")]
    ReturnValueIgnored(Value),

    /// A failure was awaited again after it had already been delivered.
    #[error("outcome of the future was already taken")]
    OutcomeTaken,

    /// A deadline passed before the awaited future settled.
    #[error("timeout")]
    Timeout,

    /// A [`Co`](crate::coro::Co) handle was used after its computation ended.
    #[error("computation has already finished")]
    Finished,

    /// The event loop stopped or went idle before a result was available.
    #[error("event loop stopped before the computation finished")]
    Unfinished,
}

fn format_keys(keys: &[Key]) -> String {
    let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
    format!("[{}]", keys.join(", "))
}
