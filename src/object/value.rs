//! Dynamic values and control signals carried through dispatched calls.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::object::space::ObjectId;

/// A dynamically typed value: argument, return value or yielded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Sym(String),
    List(Vec<Value>),
    Object(ObjectId),
}

impl Value {
    /// A symbol value (`:name`).
    #[must_use]
    pub fn sym(name: impl Into<String>) -> Self {
        Self::Sym(name.into())
    }

    #[must_use]
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[must_use]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Sym(s) => Some(s),
            _ => None,
        }
    }

    /// Text used for pattern matching: raw contents for strings and symbols,
    /// the display form otherwise.
    #[must_use]
    pub fn text(&self) -> String {
        self.as_str()
            .map_or_else(|| self.to_string(), ToString::to_string)
    }

    /// Yielded-values form of one expected value: a scalar becomes a
    /// one-element list, a list has its nested lists spliced in one level.
    /// `[[1, 2]]` and `[1, 2]` both give `1, 2`.
    #[must_use]
    pub fn flatten_one(&self) -> Vec<Self> {
        let Self::List(items) = self else {
            return vec![self.clone()];
        };
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Self::List(inner) => flat.extend(inner.iter().cloned()),
                other => flat.push(other.clone()),
            }
        }
        flat
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Sym(s) => write!(f, ":{s}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

/// Build an argument list from heterogeneous values.
///
/// ```
/// use spyglass::{args, object::value::Value};
///
/// assert_eq!(args![1, "x"], vec![Value::Int(1), Value::Str("x".into())]);
/// assert!(args![].is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::object::value::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::object::value::Value::from($value)),+]
    };
}

// ──────────────────── signals ────────────────────

/// An error raised by a member, e.g. `ArgumentError: x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaisedError {
    /// Error type name, compared by identity (exact string equality).
    pub kind: String,
    pub message: String,
}

impl RaisedError {
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A non-local exit carrying a tag and an optional value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thrown {
    pub tag: String,
    pub value: Value,
}

/// Abnormal completion of a call. Interception captures it and re-raises it
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    Raise(RaisedError),
    Throw(Thrown),
}

impl Signal {
    #[must_use]
    pub fn raise(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raise(RaisedError::new(kind, message))
    }

    #[must_use]
    pub fn throw(tag: impl Into<String>) -> Self {
        Self::throw_with(tag, Value::Nil)
    }

    #[must_use]
    pub fn throw_with(tag: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Throw(Thrown {
            tag: tag.into(),
            value: value.into(),
        })
    }

    /// `NoMethodError` as produced by the dispatcher.
    #[must_use]
    pub fn no_method(message: impl Into<String>) -> Self {
        Self::raise(NO_METHOD_ERROR, message)
    }

    #[must_use]
    pub const fn raised(&self) -> Option<&RaisedError> {
        match self {
            Self::Raise(err) => Some(err),
            Self::Throw(_) => None,
        }
    }

    #[must_use]
    pub const fn thrown(&self) -> Option<&Thrown> {
        match self {
            Self::Throw(thrown) => Some(thrown),
            Self::Raise(_) => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise(err) => write!(f, "{err}"),
            Self::Throw(thrown) => write!(f, "uncaught throw :{}", thrown.tag),
        }
    }
}

impl std::error::Error for Signal {}

/// Error kind used for unresolvable or inaccessible members.
pub const NO_METHOD_ERROR: &str = "NoMethodError";

/// Outcome of one dispatched call.
pub type CallResult = std::result::Result<Value, Signal>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::sym("one").to_string(), ":one");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(
            Value::list([Value::from(1), Value::sym("a")]).to_string(),
            "[1, :a]"
        );
    }

    #[test]
    fn text_uses_raw_string_contents() {
        assert_eq!(Value::from("abc").text(), "abc");
        assert_eq!(Value::sym("abc").text(), "abc");
        assert_eq!(Value::from(12).text(), "12");
    }

    #[test]
    fn flatten_one_unwraps_lists_only() {
        assert_eq!(Value::from(1).flatten_one(), vec![Value::from(1)]);
        assert_eq!(
            Value::from(vec![1, 2]).flatten_one(),
            vec![Value::from(1), Value::from(2)]
        );
    }

    #[test]
    fn flatten_one_splices_nested_lists_once() {
        let nested = Value::list(vec![Value::from(vec![1, 2])]);
        assert_eq!(nested.flatten_one(), vec![Value::from(1), Value::from(2)]);
        let mixed = Value::list(vec![Value::from(1), Value::from(vec![2, 3])]);
        assert_eq!(mixed.flatten_one(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        let deep = Value::list(vec![Value::list(vec![Value::from(vec![1])])]);
        assert_eq!(deep.flatten_one(), vec![Value::from(vec![1])]);
    }

    #[test]
    fn args_macro_converts_each_item() {
        let built = args![1, "two", Value::sym("three"), vec![4]];
        assert_eq!(built.len(), 4);
        assert_eq!(built[2], Value::sym("three"));
        assert_eq!(built[3], Value::List(vec![Value::Int(4)]));
    }

    #[test]
    fn signal_accessors() {
        let raised = Signal::raise("ArgumentError", "x");
        assert_eq!(raised.raised().map(|e| e.kind.as_str()), Some("ArgumentError"));
        assert!(raised.thrown().is_none());
        let thrown = Signal::throw_with("done", 5);
        assert_eq!(thrown.thrown().map(|t| t.tag.as_str()), Some("done"));
        assert_eq!(thrown.to_string(), "uncaught throw :done");
    }
}
