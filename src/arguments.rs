//! Normalization of callback payloads.
//!
//! A completion callback can be fired with any mix of positional and keyword
//! values. [`Arguments::capture`] collapses that payload into the single
//! [`Value`] a waiting computation receives:
//!
//! - nothing at all becomes [`Value::None`]
//! - exactly one positional value becomes that value
//! - anything else stays composite as [`Value::Arguments`]
//!
//! ```
//! use genloop::{Arguments, Value};
//!
//! assert_eq!(Arguments::none().capture(), Value::None);
//! assert_eq!(Arguments::one(42).capture(), Value::Int(42));
//!
//! let composite = Arguments::positional([42, 43]).capture();
//! assert!(composite.as_arguments().is_some());
//! ```

use crate::value::Value;

use std::collections::BTreeMap;
use std::fmt;

/// Positional and keyword values delivered to a completion callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Arguments {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// An empty payload.
    pub fn none() -> Self {
        Self::default()
    }

    /// A payload of exactly one positional value.
    pub fn one(value: impl Into<Value>) -> Self {
        Self {
            args: vec![value.into()],
            kwargs: BTreeMap::new(),
        }
    }

    pub fn positional<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            args: values.into_iter().map(Into::into).collect(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Adds a keyword value, replacing any previous value for `name`.
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Collapses the payload into the outcome seen by the waiting side.
    pub fn capture(self) -> Value {
        if self.is_empty() {
            return Value::None;
        }

        if self.args.len() == 1 && self.kwargs.is_empty() {
            let mut args = self.args;
            return args.pop().unwrap_or_default();
        }

        Value::Arguments(self)
    }
}

impl PartialEq<(Vec<Value>, BTreeMap<String, Value>)> for Arguments {
    fn eq(&self, (args, kwargs): &(Vec<Value>, BTreeMap<String, Value>)) -> bool {
        self.args == *args && self.kwargs == *kwargs
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Arguments(")?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
            first = false;
        }
        for (name, value) in &self.kwargs {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        f.write_str(")")
    }
}
