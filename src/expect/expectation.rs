//! Declared expectations and the shared constraint-builder surface.
//!
//! [`Constrain`] carries every builder (`count`, `with`, `ordered`,
//! `and_raise`, ...). [`Expectation`] stores constraints for validation at the
//! end of the test; the spy [`Verification`](crate::expect::verify::Verification)
//! checks them immediately.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::errors::SpyError;
use crate::core::failure::Failure;
use crate::expect::constraint::{Constraint, Evidence, render_methods};
use crate::expect::matchers::{RaiseMatcher, TextMatcher, ValueMatcher};
use crate::mocks::journal::Journal;
use crate::object::space::{ObjectId, ObjectSpace};
use crate::object::value::{RaisedError, Value};

/// Builder surface shared by deferred expectations and immediate spy checks.
pub trait Constrain: Sized {
    type Error: From<SpyError>;

    /// Number of expected methods.
    fn method_count(&self) -> usize;

    /// Engage one constraint.
    fn constrain(&self, constraint: Constraint) -> Result<Self, Self::Error>;

    /// Exact per-method call counts, zippered.
    fn count(&self, expected: &[usize]) -> Result<Self, Self::Error> {
        self.constrain(Constraint::count(expected, self.method_count())?)
    }

    fn once(&self) -> Result<Self, Self::Error> {
        self.count(&[1])
    }

    fn twice(&self) -> Result<Self, Self::Error> {
        self.count(&[2])
    }

    fn count_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[usize]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::count_by(predicate))
    }

    /// Arguments: the full list for one method, one value per method otherwise.
    fn with(&self, expected: Vec<Value>) -> Result<Self, Self::Error> {
        self.constrain(Constraint::args(expected, self.method_count())?)
    }

    fn with_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Vec<Value>>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::args_by(predicate))
    }

    fn without_arguments(&self) -> Result<Self, Self::Error> {
        self.constrain(Constraint::WithoutArgs)
    }

    /// The methods arrive as one contiguous run, exactly once.
    fn ordered(&self) -> Result<Self, Self::Error> {
        self.ordered_times(1)
    }

    fn ordered_times(&self, times: usize) -> Result<Self, Self::Error> {
        self.constrain(Constraint::ordered(times, self.method_count())?)
    }

    fn with_caller(&self, expected: impl Into<TextMatcher>) -> Result<Self, Self::Error> {
        self.with_callers(vec![expected.into()])
    }

    fn with_callers(&self, expected: Vec<TextMatcher>) -> Result<Self, Self::Error> {
        self.constrain(Constraint::caller(expected, self.method_count())?)
    }

    fn with_caller_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Vec<String>>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::caller_by(predicate))
    }

    fn and_return(&self, expected: impl Into<ValueMatcher>) -> Result<Self, Self::Error> {
        self.and_returns(vec![expected.into()])
    }

    fn and_returns(&self, expected: Vec<ValueMatcher>) -> Result<Self, Self::Error> {
        self.constrain(Constraint::returns(expected, self.method_count())?)
    }

    fn and_return_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Value>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::returns_by(predicate))
    }

    fn and_raise(&self, expected: impl Into<RaiseMatcher>) -> Result<Self, Self::Error> {
        self.and_raises(vec![expected.into()])
    }

    /// Empty list means any error.
    fn and_raises(&self, expected: Vec<RaiseMatcher>) -> Result<Self, Self::Error> {
        self.constrain(Constraint::raises(expected, self.method_count())?)
    }

    fn and_raise_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Option<RaisedError>>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::raises_by(predicate))
    }

    fn without_raise(&self) -> Result<Self, Self::Error> {
        self.constrain(Constraint::WithoutRaise)
    }

    /// Only the tag is compared, never the carried value.
    fn and_throw(&self, tag: &str) -> Result<Self, Self::Error> {
        self.and_throws(&[tag])
    }

    /// Empty list means any tag.
    fn and_throws(&self, tags: &[&str]) -> Result<Self, Self::Error> {
        let tags = tags.iter().map(ToString::to_string).collect();
        self.constrain(Constraint::throws(tags, self.method_count())?)
    }

    fn and_throw_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Option<String>>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::throws_by(predicate))
    }

    fn without_throw(&self) -> Result<Self, Self::Error> {
        self.constrain(Constraint::WithoutThrow)
    }

    /// Empty list means any yield.
    fn and_yield(&self, expected: Vec<Value>) -> Result<Self, Self::Error> {
        self.constrain(Constraint::yields(expected, self.method_count())?)
    }

    fn and_yield_by<F>(&self, predicate: F) -> Result<Self, Self::Error>
    where
        F: Fn(&[Vec<Option<Vec<Value>>>]) -> bool + Send + Sync + 'static,
    {
        self.constrain(Constraint::yields_by(predicate))
    }

    fn without_yield(&self) -> Result<Self, Self::Error> {
        self.constrain(Constraint::WithoutYield)
    }
}

/// Expectation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Declared,
    Satisfied,
    Failed,
}

#[derive(Debug)]
struct ExpectationInner {
    target: ObjectId,
    methods: Vec<String>,
    negated: bool,
    site: String,
    constraints: Vec<Constraint>,
    status: Status,
    failure: Option<Failure>,
}

/// Deferred assertion about the calls a target receives during one test.
/// Cloning yields another handle to the same expectation.
#[derive(Clone)]
pub struct Expectation {
    inner: Arc<Mutex<ExpectationInner>>,
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Expectation")
            .field("target", &inner.target)
            .field("methods", &inner.methods)
            .field("negated", &inner.negated)
            .field("status", &inner.status)
            .finish_non_exhaustive()
    }
}

impl Expectation {
    /// Declare an expectation. Duplicate method names collapse to one.
    pub fn new(
        target: ObjectId,
        methods: &[&str],
        negated: bool,
        site: impl Into<String>,
    ) -> crate::core::errors::Result<Self> {
        if methods.is_empty() {
            return Err(SpyError::usage(
                "to_receive",
                "at least one method name required",
            ));
        }
        let mut unique: Vec<String> = Vec::with_capacity(methods.len());
        for method in methods {
            if !unique.iter().any(|m| m == method) {
                unique.push((*method).to_string());
            }
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(ExpectationInner {
                target,
                methods: unique,
                negated,
                site: site.into(),
                constraints: Vec::new(),
                status: Status::Declared,
                failure: None,
            })),
        })
    }

    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.inner.lock().target
    }

    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.inner.lock().methods.clone()
    }

    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.inner.lock().negated
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        self.inner.lock().failure.clone()
    }

    /// Validate against the journal. Runs once; later calls return the
    /// first verdict.
    pub fn validate(&self, journal: &Journal, space: &ObjectSpace) -> Option<Failure> {
        let (target, methods, negated, site, constraints) = {
            let inner = self.inner.lock();
            if inner.status != Status::Declared {
                return inner.failure.clone();
            }
            (
                inner.target,
                inner.methods.clone(),
                inner.negated,
                inner.site.clone(),
                inner.constraints.clone(),
            )
        };

        let evidence = Evidence::collect(journal, space, target, &methods).at_site(site);
        let verdict = evidence.check_presence(negated).and_then(|()| {
            constraints
                .iter()
                .try_for_each(|constraint| constraint.check(&evidence))
        });

        let mut inner = self.inner.lock();
        match verdict {
            Ok(()) => {
                inner.status = Status::Satisfied;
                None
            }
            Err(failure) => {
                inner.status = Status::Failed;
                inner.failure = Some(failure.clone());
                Some(failure)
            }
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        write!(
            f,
            "expect {} {} {}",
            inner.target,
            if inner.negated { "not to receive" } else { "to receive" },
            render_methods(&inner.methods)
        )
    }
}

impl Constrain for Expectation {
    type Error = SpyError;

    fn method_count(&self) -> usize {
        self.inner.lock().methods.len()
    }

    fn constrain(&self, constraint: Constraint) -> Result<Self, SpyError> {
        let mut inner = self.inner.lock();
        if inner.negated {
            return Err(SpyError::usage(
                "not_to_receive",
                "constraints can not be attached to a negated expectation",
            ));
        }
        if inner.status != Status::Declared {
            return Err(SpyError::usage(
                "constrain",
                "expectation was already validated",
            ));
        }
        inner.constraints.push(constraint);
        drop(inner);
        Ok(self.clone())
    }
}
