//! Dynamic values carried through callbacks, keys and results.
//!
//! Computations exchange outcomes whose shape is only known at runtime: a
//! callback may be fired with nothing, with one value, or with a mix of
//! positional and keyword values. [`Value`] is the closed set of shapes the
//! engine understands. It is hashable and totally ordered so that any value
//! (tuples included) can double as a registry [`Key`].

use crate::arguments::Arguments;

use std::collections::BTreeMap;
use std::fmt;

/// A dynamically shaped value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// The absence of a value.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    /// A composite callback payload that could not be collapsed to one value.
    Arguments(Arguments),
}

impl Value {
    /// Returns `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of a list or tuple.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the composite payload when the value is one.
    pub fn as_arguments(&self) -> Option<&Arguments> {
        match self {
            Value::Arguments(arguments) => Some(arguments),
            _ => None,
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_seq(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
            Value::Arguments(arguments) => write!(f, "{arguments}"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// Only widths that always fit in an `i64`.
macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i64::from(i))
            }
        })*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl PartialEq<(Vec<Value>, BTreeMap<String, Value>)> for Value {
    fn eq(&self, other: &(Vec<Value>, BTreeMap<String, Value>)) -> bool {
        match self {
            Value::Arguments(arguments) => arguments == other,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum KeyRepr {
    User(Value),
    Task(u64),
}

/// Identifies a callback slot in a computation's registry.
///
/// User keys wrap an arbitrary [`Value`]. Task keys are generated by the
/// engine for [`Task`](crate::coro::Task) yield points and can never collide
/// with a user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(KeyRepr);

impl Key {
    pub(crate) fn task(id: u64) -> Self {
        Key(KeyRepr::Task(id))
    }

    /// The user value behind this key, `None` for engine-generated keys.
    pub fn value(&self) -> Option<&Value> {
        match &self.0 {
            KeyRepr::User(value) => Some(value),
            KeyRepr::Task(_) => None,
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key(KeyRepr::User(value))
    }
}

macro_rules! user_key {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(value: $t) -> Self {
                Key(KeyRepr::User(value.into()))
            }
        })*
    };
}

user_key!(bool, i8, i16, i32, i64, u8, u16, u32, &str, String);

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Key {
    fn from(pair: (A, B)) -> Self {
        Key(KeyRepr::User(pair.into()))
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Key {
    fn from(triple: (A, B, C)) -> Self {
        Key(KeyRepr::User(triple.into()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            KeyRepr::User(value) => write!(f, "{value}"),
            KeyRepr::Task(id) => write!(f, "<task #{id}>"),
        }
    }
}
