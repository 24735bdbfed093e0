//! Assertion failure records handed to the reporting collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One failed assertion or expectation.
///
/// Carries everything a reporter needs to render the failure without
/// re-deriving it: the headline, optional expected/actual descriptions, the
/// target object's identity and the call-site chain that declared the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable headline.
    pub message: String,
    /// What the check wanted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// What was actually observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Inspect string of the object the check was about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Call-site chain (innermost first) attributed to the check.
    #[serde(default)]
    pub callers: Vec<String>,
}

impl Failure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            target: None,
            callers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    #[must_use]
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attach a call site, keeping any already attached ones.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.callers.push(caller.into());
        self
    }
}

impl From<&str> for Failure {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Failure {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(expected) = &self.expected {
            write!(f, "\nExpected: {expected}")?;
        }
        if let Some(actual) = &self.actual {
            write!(f, "\nActual:   {actual}")?;
        }
        Ok(())
    }
}
