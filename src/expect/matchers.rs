//! Value, text and error matchers shared by the constraint validators.

#![allow(missing_docs)]

use std::fmt;

use regex::Regex;

use crate::core::errors::{Result, SpyError};
use crate::object::value::{RaisedError, Value};

/// Spread `given` over `len` slots: slot `i` takes `given[i]`, and a shorter
/// list repeats its last item for the remainder.
#[must_use]
pub fn zipper<T: Clone>(given: &[T], len: usize) -> Vec<T> {
    match given.last() {
        Some(last) => (0..len)
            .map(|i| given.get(i).unwrap_or(last).clone())
            .collect(),
        None => Vec::new(),
    }
}

/// Number of non-overlapping runs of `pattern` inside `sequence`.
#[must_use]
pub fn count_runs<T: PartialEq>(sequence: &[T], pattern: &[T]) -> usize {
    if pattern.is_empty() || pattern.len() > sequence.len() {
        return 0;
    }
    let mut runs = 0;
    let mut i = 0;
    while i + pattern.len() <= sequence.len() {
        if sequence[i..i + pattern.len()] == *pattern {
            runs += 1;
            i += pattern.len();
        } else {
            i += 1;
        }
    }
    runs
}

fn compile(operation: &'static str, raw: &str) -> Result<Regex> {
    Regex::new(raw)
        .map_err(|error| SpyError::usage(operation, format!("invalid pattern {raw:?}: {error}")))
}

// ──────────────────── text ────────────────────

/// Matches a piece of text.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    Exact(String),
    Contains(String),
    Pattern(Regex),
}

impl TextMatcher {
    pub fn pattern(raw: &str) -> Result<Self> {
        compile("pattern", raw).map(Self::Pattern)
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(expected) => text == expected,
            Self::Contains(fragment) => text.contains(fragment.as_str()),
            Self::Pattern(regex) => regex.is_match(text),
        }
    }

    /// Exact strings become substring matches; patterns are unchanged.
    #[must_use]
    pub fn loosen(self) -> Self {
        match self {
            Self::Exact(text) => Self::Contains(text),
            other => other,
        }
    }
}

impl PartialEq for TextMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) | (Self::Contains(a), Self::Contains(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "{text:?}"),
            Self::Contains(text) => write!(f, "*{text:?}*"),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for TextMatcher {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

impl From<String> for TextMatcher {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<Regex> for TextMatcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

// ──────────────────── values ────────────────────

/// Matches a returned value: equality, or a pattern over its text form.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    Eq(Value),
    Pattern(Regex),
}

impl ValueMatcher {
    pub fn pattern(raw: &str) -> Result<Self> {
        compile("and_return", raw).map(Self::Pattern)
    }

    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Eq(expected) => expected == value,
            Self::Pattern(regex) => regex.is_match(&value.text()),
        }
    }
}

impl fmt::Display for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(value) => write!(f, "{value}"),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<Value> for ValueMatcher {
    fn from(value: Value) -> Self {
        Self::Eq(value)
    }
}

impl From<i32> for ValueMatcher {
    fn from(value: i32) -> Self {
        Self::Eq(Value::from(value))
    }
}

impl From<bool> for ValueMatcher {
    fn from(value: bool) -> Self {
        Self::Eq(Value::from(value))
    }
}

impl From<&str> for ValueMatcher {
    fn from(value: &str) -> Self {
        Self::Eq(Value::from(value))
    }
}

impl From<Regex> for ValueMatcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

// ──────────────────── errors ────────────────────

/// Matches a raised error by kind and/or message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaiseMatcher {
    /// Compared by exact equality.
    pub kind: Option<String>,
    pub message: Option<TextMatcher>,
}

impl RaiseMatcher {
    /// Any error at all.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: None,
        }
    }

    #[must_use]
    pub fn message(message: impl Into<TextMatcher>) -> Self {
        Self {
            kind: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<TextMatcher>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn matches(&self, raised: &RaisedError) -> bool {
        self.kind.as_deref().is_none_or(|kind| kind == raised.kind)
            && self
                .message
                .as_ref()
                .is_none_or(|message| message.matches(&raised.message))
    }
}

impl fmt::Display for RaiseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.message) {
            (None, None) => f.write_str("any error to be raised"),
            (Some(kind), None) => f.write_str(kind),
            (None, Some(message)) => write!(f, "error with message {message}"),
            (Some(kind), Some(message)) => write!(f, "{kind}: {message}"),
        }
    }
}

impl From<&str> for RaiseMatcher {
    fn from(value: &str) -> Self {
        Self::kind(value)
    }
}

impl From<(&str, &str)> for RaiseMatcher {
    fn from((kind, message): (&str, &str)) -> Self {
        Self::kind(kind).with_message(message)
    }
}

impl From<(&str, Regex)> for RaiseMatcher {
    fn from((kind, message): (&str, Regex)) -> Self {
        Self::kind(kind).with_message(message)
    }
}
