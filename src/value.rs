//! The dynamic value model shared by task arguments, constants and results.
//!
//! Tasks in a fusion subgraph are addressed by [`Key`]s, and their positional
//! arguments are [`Arg`]s. An argument can name another task or an external
//! input, or it can be a plain literal [`Value`]. Keys are always hashable,
//! values are only sometimes hashable: a hashable value can stand in for a key,
//! an unhashable one is always a literal.

use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Type-erased, thread-safe payload carried by [`Value::Opaque`].
pub type Dynamic = Arc<dyn Any + Send + Sync>;

/// An opaque, hashable identifier for a task or an external input.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Tuple(Vec<Key>),
}

impl Key {
    /// Converts the key back into the equivalent runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Tuple(items) => Value::Tuple(items.iter().map(Key::to_value).collect()),
        }
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Bool(value)
    }
}

impl<A, B> From<(A, B)> for Key
where
    A: Into<Key>,
    B: Into<Key>,
{
    fn from((a, b): (A, B)) -> Self {
        Key::Tuple(vec![a.into(), b.into()])
    }
}

/// A runtime value flowing through a fused callable.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Opaque(Dynamic),
}

impl Value {
    /// Wraps an arbitrary payload.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Returns the key this value is equal to, or `None` when the value is
    /// not hashable.
    ///
    /// Booleans, integers, strings and tuples made only of those are
    /// hashable. Floats, lists, the unit value and opaque payloads are not.
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Tuple(items) => items
                .iter()
                .map(Value::as_key)
                .collect::<Option<Vec<_>>>()
                .map(Key::Tuple),
            Value::Unit | Value::Float(_) | Value::List(_) | Value::Opaque(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => fmt_seq(f, "(", items, ")"),
            Value::List(items) => fmt_seq(f, "[", items, "]"),
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

fn fmt_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item:?}")?;
    }
    write!(f, "{close}")
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Key> for Value {
    fn from(value: Key) -> Self {
        value.to_value()
    }
}

/// A positional argument of a task.
///
/// [`Arg::Key`] is an explicit reference which must resolve to an external
/// input or another task. [`Arg::Value`] is a literal, unless it is hashable
/// and happens to equal a live key, in which case it is read as a reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Key(Key),
    Value(Value),
}

impl Arg {
    /// Explicit reference to another task or an input.
    pub fn key(key: impl Into<Key>) -> Self {
        Arg::Key(key.into())
    }

    /// Literal argument.
    pub fn value(value: impl Into<Value>) -> Self {
        Arg::Value(value.into())
    }

    /// Reads the argument as a key, if it is hashable.
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Arg::Key(key) => Some(key.clone()),
            Arg::Value(value) => value.as_key(),
        }
    }

    /// The value used when the argument does not resolve to any symbol.
    pub(crate) fn into_value(self) -> Value {
        match self {
            Arg::Key(key) => key.to_value(),
            Arg::Value(value) => value,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Key> for Arg {
    fn from(key: Key) -> Self {
        Arg::Key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashable_values_become_keys() {
        assert_eq!(Value::from("algo0").as_key(), Some(Key::from("algo0")));
        assert_eq!(Value::Int(3).as_key(), Some(Key::Int(3)));
        assert_eq!(
            Value::Tuple(vec!["x".into(), Value::Int(1)]).as_key(),
            Some(Key::from(("x", 1i64)))
        );
    }

    #[test]
    fn test_unhashable_values() {
        assert_eq!(Value::List(vec![Value::Int(4)]).as_key(), None);
        assert_eq!(Value::Float(1.5).as_key(), None);
        assert_eq!(Value::Unit.as_key(), None);
        assert_eq!(Value::opaque(vec![1u8, 2, 3]).as_key(), None);
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Float(2.0)]).as_key(),
            None
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::from("a").to_string(), r#""a""#);
        assert_eq!(Key::from(("a", 0i64)).to_string(), r#"("a", 0)"#);
        assert_eq!(Key::Tuple(vec![Key::Int(1)]).to_string(), "(1,)");
    }

    #[test]
    fn test_key_serde_untagged() {
        let key: Key = serde_json::from_str(r#"["scale", 2]"#).unwrap();
        assert_eq!(key, Key::from(("scale", 2i64)));
        assert_eq!(serde_json::to_string(&Key::from("x")).unwrap(), r#""x""#);
    }

    #[test]
    fn test_opaque_identity() {
        let a = Value::opaque(String::from("payload"));
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::opaque(String::from("payload")));
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("payload"));
    }
}
