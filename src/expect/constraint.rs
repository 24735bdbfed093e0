//! Constraint validators over journal evidence.
//!
//! A [`Constraint`] is built at declaration time (arity and usage are checked
//! right away) and evaluated later against [`Evidence`]: the journal entries of
//! one target, grouped by expected method. Values given for several methods are
//! spread with [`zipper`].

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use crate::core::errors::{Result, SpyError};
use crate::core::failure::Failure;
use crate::expect::matchers::{RaiseMatcher, TextMatcher, ValueMatcher, count_runs, zipper};
use crate::mocks::journal::{Invocation, Journal};
use crate::object::space::{ObjectId, ObjectSpace};
use crate::object::value::{RaisedError, Value};

/// Predicate over per-method, per-call observations.
pub type Predicate<T> = Arc<dyn Fn(&[Vec<T>]) -> bool + Send + Sync>;

/// Predicate over per-method call counts.
pub type CountPredicate = Arc<dyn Fn(&[usize]) -> bool + Send + Sync>;

/// One engaged check of an expectation or spy verification.
#[derive(Clone)]
pub enum Constraint {
    Count(Vec<usize>),
    CountBy(CountPredicate),
    Args(Vec<Value>),
    ArgsBy(Predicate<Vec<Value>>),
    WithoutArgs,
    /// Contiguous, non-overlapping runs of the method sequence.
    Ordered(usize),
    Caller(Vec<TextMatcher>),
    CallerBy(Predicate<Vec<String>>),
    Returns(Vec<ValueMatcher>),
    /// Calls that did not return observe `nil`.
    ReturnsBy(Predicate<Value>),
    /// Empty means any error.
    Raises(Vec<RaiseMatcher>),
    RaisesBy(Predicate<Option<RaisedError>>),
    WithoutRaise,
    /// Empty means any tag.
    Throws(Vec<String>),
    ThrowsBy(Predicate<Option<String>>),
    WithoutThrow,
    /// Empty means any yield.
    Yields(Vec<Value>),
    YieldsBy(Predicate<Option<Vec<Value>>>),
    WithoutYield,
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(counts) => f.debug_tuple("Count").field(counts).finish(),
            Self::Args(args) => f.debug_tuple("Args").field(args).finish(),
            Self::Ordered(n) => f.debug_tuple("Ordered").field(n).finish(),
            Self::Caller(m) => f.debug_tuple("Caller").field(m).finish(),
            Self::Returns(m) => f.debug_tuple("Returns").field(m).finish(),
            Self::Raises(m) => f.debug_tuple("Raises").field(m).finish(),
            Self::Throws(tags) => f.debug_tuple("Throws").field(tags).finish(),
            Self::Yields(values) => f.debug_tuple("Yields").field(values).finish(),
            Self::WithoutArgs => f.write_str("WithoutArgs"),
            Self::WithoutRaise => f.write_str("WithoutRaise"),
            Self::WithoutThrow => f.write_str("WithoutThrow"),
            Self::WithoutYield => f.write_str("WithoutYield"),
            Self::CountBy(_)
            | Self::ArgsBy(_)
            | Self::CallerBy(_)
            | Self::ReturnsBy(_)
            | Self::RaisesBy(_)
            | Self::ThrowsBy(_)
            | Self::YieldsBy(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Single value for any number of methods, any number for one method, or
/// exactly one per method.
fn check_arity(operation: &'static str, given: usize, methods: usize) -> Result<()> {
    if given == 1 || methods == 1 || given == methods {
        return Ok(());
    }
    Err(SpyError::usage(
        operation,
        format!("wrong number of arguments ({given} for 1..{methods})"),
    ))
}

fn require_values(operation: &'static str, given: usize, methods: usize) -> Result<()> {
    if given == 0 {
        return Err(SpyError::usage(operation, "at least one value required"));
    }
    check_arity(operation, given, methods)
}

impl Constraint {
    pub fn count(expected: &[usize], methods: usize) -> Result<Self> {
        require_values("count", expected.len(), methods)?;
        Ok(Self::Count(expected.to_vec()))
    }

    pub fn count_by<F>(predicate: F) -> Self
    where
        F: Fn(&[usize]) -> bool + Send + Sync + 'static,
    {
        Self::CountBy(Arc::new(predicate))
    }

    /// For one method `expected` is the full argument list; for several it
    /// holds one single-argument value per method.
    pub fn args(expected: Vec<Value>, methods: usize) -> Result<Self> {
        if methods > 1 {
            require_values("with", expected.len(), methods)?;
        }
        Ok(Self::Args(expected))
    }

    pub fn args_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Vec<Value>>]) -> bool + Send + Sync + 'static,
    {
        Self::ArgsBy(Arc::new(predicate))
    }

    pub fn ordered(times: usize, methods: usize) -> Result<Self> {
        if methods < 2 {
            return Err(SpyError::usage(
                "ordered",
                "ordering works only with multiple methods",
            ));
        }
        if times == 0 {
            return Err(SpyError::usage("ordered", "sequence count must be positive"));
        }
        Ok(Self::Ordered(times))
    }

    /// String matchers match anywhere inside a call-site frame.
    pub fn caller(expected: Vec<TextMatcher>, methods: usize) -> Result<Self> {
        require_values("with_caller", expected.len(), methods)?;
        Ok(Self::Caller(
            expected.into_iter().map(TextMatcher::loosen).collect(),
        ))
    }

    pub fn caller_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Vec<String>>]) -> bool + Send + Sync + 'static,
    {
        Self::CallerBy(Arc::new(predicate))
    }

    pub fn returns(expected: Vec<ValueMatcher>, methods: usize) -> Result<Self> {
        require_values("and_return", expected.len(), methods)?;
        Ok(Self::Returns(expected))
    }

    pub fn returns_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Value>]) -> bool + Send + Sync + 'static,
    {
        Self::ReturnsBy(Arc::new(predicate))
    }

    pub fn raises(expected: Vec<RaiseMatcher>, methods: usize) -> Result<Self> {
        if !expected.is_empty() {
            check_arity("and_raise", expected.len(), methods)?;
        }
        Ok(Self::Raises(expected))
    }

    pub fn raises_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Option<RaisedError>>]) -> bool + Send + Sync + 'static,
    {
        Self::RaisesBy(Arc::new(predicate))
    }

    pub fn throws(expected: Vec<String>, methods: usize) -> Result<Self> {
        if !expected.is_empty() {
            check_arity("and_throw", expected.len(), methods)?;
        }
        Ok(Self::Throws(expected))
    }

    pub fn throws_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Option<String>>]) -> bool + Send + Sync + 'static,
    {
        Self::ThrowsBy(Arc::new(predicate))
    }

    /// For one method `expected` is the yielded argument list; for several
    /// each zippered value is unwrapped one level.
    pub fn yields(expected: Vec<Value>, methods: usize) -> Result<Self> {
        if methods > 1 && !expected.is_empty() {
            check_arity("and_yield", expected.len(), methods)?;
        }
        Ok(Self::Yields(expected))
    }

    pub fn yields_by<F>(predicate: F) -> Self
    where
        F: Fn(&[Vec<Option<Vec<Value>>>]) -> bool + Send + Sync + 'static,
    {
        Self::YieldsBy(Arc::new(predicate))
    }

    /// Evaluate against `evidence`. The first violation is returned.
    pub fn check(&self, evidence: &Evidence) -> std::result::Result<(), Failure> {
        match self {
            Self::Count(expected) => evidence.check_count(expected),
            Self::CountBy(predicate) => {
                let counts = evidence.counts();
                if predicate(&counts) {
                    return Ok(());
                }
                Err(evidence
                    .failure(format!(
                        "{} received {} message(s) wrong amount of times",
                        evidence.target,
                        evidence.method_list()
                    ))
                    .with_expected("counts to pass the given validation")
                    .with_actual(render_counts(&evidence.methods, &counts)))
            }
            Self::Args(expected) => evidence.check_args(expected),
            Self::ArgsBy(predicate) => evidence.check_by(
                predicate,
                |call| call.arguments.clone(),
                "with unexpected arguments",
                |args| render_values(args),
            ),
            Self::WithoutArgs => evidence.check_without_args(),
            Self::Ordered(times) => evidence.check_ordered(*times),
            Self::Caller(expected) => evidence.check_caller(expected),
            Self::CallerBy(predicate) => evidence.check_by(
                predicate,
                |call| call.callers.clone(),
                "from wrong location",
                |callers| callers.first().cloned().unwrap_or_default(),
            ),
            Self::Returns(expected) => evidence.check_returns(expected),
            Self::ReturnsBy(predicate) => evidence.check_by(
                predicate,
                |call| call.returned().cloned().unwrap_or(Value::Nil),
                "and returned unexpected value(s)",
                ToString::to_string,
            ),
            Self::Raises(expected) => evidence.check_raises(expected),
            Self::RaisesBy(predicate) => evidence.check_by(
                predicate,
                |call| call.raised().cloned(),
                "but did not raise accordingly",
                |raised| raised.as_ref().map_or_else(|| "nothing".to_string(), ToString::to_string),
            ),
            Self::WithoutRaise => evidence.check_without(
                |call| call.raised().map(ToString::to_string),
                "and raised an unexpected error",
                "nothing to be raised",
            ),
            Self::Throws(expected) => evidence.check_throws(expected),
            Self::ThrowsBy(predicate) => evidence.check_by(
                predicate,
                |call| call.thrown().map(|thrown| thrown.tag.clone()),
                "but did not throw accordingly",
                |tag| tag.as_ref().map_or_else(|| "nothing".to_string(), |tag| format!(":{tag}")),
            ),
            Self::WithoutThrow => evidence.check_without(
                |call| call.thrown().map(|thrown| format!(":{}", thrown.tag)),
                "and thrown an unexpected symbol",
                "nothing to be thrown",
            ),
            Self::Yields(expected) => evidence.check_yields(expected),
            Self::YieldsBy(predicate) => evidence.check_by(
                predicate,
                |call| call.yielded.clone(),
                "but did not yield accordingly",
                |yielded| {
                    yielded
                        .as_ref()
                        .map_or_else(|| "nothing".to_string(), |values| render_list(values))
                },
            ),
            Self::WithoutYield => evidence.check_without(
                |call| call.yielded.as_ref().map(|values| render_list(values)),
                "and unexpectedly yielded",
                "nothing to be yielded",
            ),
        }
    }
}

// ──────────────────── evidence ────────────────────

/// Journal entries of one target, grouped by expected method.
#[derive(Debug, Clone)]
pub struct Evidence {
    pub target: String,
    pub methods: Vec<String>,
    /// Calls per expected method, in journal order.
    pub calls: Vec<Vec<Invocation>>,
    /// Method names of every journaled call on the target, in order.
    pub sequence: Vec<String>,
    /// Declaration site attached to failures.
    pub site: Option<String>,
}

impl Evidence {
    /// Snapshot the journal for `target`.
    #[must_use]
    pub fn collect(
        journal: &Journal,
        space: &ObjectSpace,
        target: ObjectId,
        methods: &[String],
    ) -> Self {
        let entries = journal.query(target);
        let calls = methods
            .iter()
            .map(|method| {
                entries
                    .iter()
                    .filter(|entry| entry.method == *method)
                    .cloned()
                    .collect()
            })
            .collect();
        Self {
            target: space.inspect(target),
            methods: methods.to_vec(),
            calls,
            sequence: entries.into_iter().map(|entry| entry.method).collect(),
            site: None,
        }
    }

    #[must_use]
    pub fn at_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        self.calls.iter().map(Vec::len).collect()
    }

    fn single(&self) -> bool {
        self.methods.len() == 1
    }

    fn method_list(&self) -> String {
        render_methods(&self.methods)
    }

    fn failure(&self, message: String) -> Failure {
        let failure = Failure::new(message).with_target(self.target.clone());
        match &self.site {
            Some(site) if !site.is_empty() => failure.with_caller(site.clone()),
            _ => failure,
        }
    }

    /// Presence check; negated form is all-or-nothing.
    pub fn check_presence(&self, negated: bool) -> std::result::Result<(), Failure> {
        for (method, calls) in self.methods.iter().zip(&self.calls) {
            match (negated, calls.len()) {
                (false, 0) => {
                    return Err(self
                        .failure(format!(
                            "Expected {} to receive :{method} message, but it was never received",
                            self.target
                        ))
                        .with_expected(format!(":{method} to be received"))
                        .with_actual("never received"));
                }
                (true, n) if n > 0 => {
                    return Err(self
                        .failure(format!(
                            "NOT expected {} to receive :{method} message",
                            self.target
                        ))
                        .with_expected(format!(":{method} not to be received"))
                        .with_actual(format!("received {n} time(s)")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_count(&self, expected: &[usize]) -> std::result::Result<(), Failure> {
        let expected = zipper(expected, self.methods.len());
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(expected) {
            if calls.len() != want {
                return Err(self
                    .failure(format!(
                        "{} received :{method} message(s) wrong amount of times",
                        self.target
                    ))
                    .with_expected(want.to_string())
                    .with_actual(calls.len().to_string()));
            }
        }
        Ok(())
    }

    fn check_args(&self, expected: &[Value]) -> std::result::Result<(), Failure> {
        let wanted: Vec<Vec<Value>> = if self.single() {
            vec![expected.to_vec()]
        } else {
            zipper(expected, self.methods.len())
                .into_iter()
                .map(|value| vec![value])
                .collect()
        };
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(wanted) {
            if calls.iter().any(|call| call.arguments == want) {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) with unexpected arguments",
                    self.target
                ))
                .with_expected(render_expected_args(&want))
                .with_actual(render_calls(method, calls, |call| render_args(&call.arguments))));
        }
        Ok(())
    }

    fn check_without_args(&self) -> std::result::Result<(), Failure> {
        for (method, calls) in self.methods.iter().zip(&self.calls) {
            if calls.iter().any(|call| call.arguments.is_empty()) {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) with unexpected arguments",
                    self.target
                ))
                .with_expected("to be called without arguments")
                .with_actual(render_calls(method, calls, |call| render_args(&call.arguments))));
        }
        Ok(())
    }

    fn check_ordered(&self, times: usize) -> std::result::Result<(), Failure> {
        let found = count_runs(&self.sequence, &self.methods);
        if found == times {
            return Ok(());
        }
        Err(self
            .failure(format!(
                "Expected {} to receive {} sequence {times} times",
                self.target,
                self.method_list()
            ))
            .with_expected(format!("{times} time(s)"))
            .with_actual(format!("{found} time(s)")))
    }

    fn check_caller(&self, expected: &[TextMatcher]) -> std::result::Result<(), Failure> {
        let expected = zipper(expected, self.methods.len());
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(expected) {
            let hit = calls
                .iter()
                .any(|call| call.callers.iter().any(|frame| want.matches(frame)));
            if hit {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) from wrong location",
                    self.target
                ))
                .with_expected(format!("caller to match {want}"))
                .with_actual(render_calls(method, calls, |call| {
                    call.callers.first().cloned().unwrap_or_default()
                })));
        }
        Ok(())
    }

    fn check_returns(&self, expected: &[ValueMatcher]) -> std::result::Result<(), Failure> {
        let expected = zipper(expected, self.methods.len());
        // A call that raised or threw returned nothing, which compares as nil.
        let nil = Value::Nil;
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(expected) {
            let hit = calls
                .iter()
                .any(|call| want.matches(call.returned().unwrap_or(&nil)));
            if hit {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) and returned unexpected value(s)",
                    self.target
                ))
                .with_expected(want.to_string())
                .with_actual(render_calls(method, calls, |call| {
                    call.returned().unwrap_or(&nil).to_string()
                })));
        }
        Ok(())
    }

    fn check_raises(&self, expected: &[RaiseMatcher]) -> std::result::Result<(), Failure> {
        let expected = if expected.is_empty() {
            vec![RaiseMatcher::any(); self.methods.len()]
        } else {
            zipper(expected, self.methods.len())
        };
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(expected) {
            let hit = calls
                .iter()
                .any(|call| call.raised().is_some_and(|raised| want.matches(raised)));
            if hit {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) but did not raise accordingly",
                    self.target
                ))
                .with_expected(want.to_string())
                .with_actual(render_calls(method, calls, |call| {
                    call.raised().map_or_else(|| "nothing".to_string(), ToString::to_string)
                })));
        }
        Ok(())
    }

    fn check_throws(&self, expected: &[String]) -> std::result::Result<(), Failure> {
        let expected: Vec<Option<String>> = if expected.is_empty() {
            vec![None; self.methods.len()]
        } else {
            zipper(expected, self.methods.len())
                .into_iter()
                .map(Some)
                .collect()
        };
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(expected) {
            let hit = calls.iter().any(|call| {
                call.thrown()
                    .is_some_and(|thrown| want.as_ref().is_none_or(|tag| *tag == thrown.tag))
            });
            if hit {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) but did not throw accordingly",
                    self.target
                ))
                .with_expected(
                    want.map_or_else(|| "any symbol to be thrown".to_string(), |tag| format!(":{tag}")),
                )
                .with_actual(render_calls(method, calls, |call| {
                    call.thrown()
                        .map_or_else(|| "nothing".to_string(), |thrown| format!(":{}", thrown.tag))
                })));
        }
        Ok(())
    }

    fn check_yields(&self, expected: &[Value]) -> std::result::Result<(), Failure> {
        let wanted: Vec<Vec<Value>> = if expected.is_empty() {
            vec![Vec::new(); self.methods.len()]
        } else if self.single() {
            vec![expected.to_vec()]
        } else {
            zipper(expected, self.methods.len())
                .iter()
                .map(Value::flatten_one)
                .collect()
        };
        for ((method, calls), want) in self.methods.iter().zip(&self.calls).zip(wanted) {
            let hit = calls.iter().any(|call| match &call.yielded {
                Some(yielded) => want.is_empty() || *yielded == want,
                None => false,
            });
            if hit {
                continue;
            }
            return Err(self
                .failure(format!(
                    "{} received :{method} message(s) but did not yield accordingly",
                    self.target
                ))
                .with_expected(if want.is_empty() {
                    "something to be yielded".to_string()
                } else {
                    render_list(&want)
                })
                .with_actual(render_calls(method, calls, |call| {
                    call.yielded
                        .as_ref()
                        .map_or_else(|| "nothing".to_string(), |values| render_list(values))
                })));
        }
        Ok(())
    }

    fn check_without<F>(
        &self,
        observed: F,
        what: &str,
        expected: &str,
    ) -> std::result::Result<(), Failure>
    where
        F: Fn(&Invocation) -> Option<String>,
    {
        for (method, calls) in self.methods.iter().zip(&self.calls) {
            if calls.iter().all(|call| observed(call).is_none()) {
                continue;
            }
            return Err(self
                .failure(format!("{} received :{method} message {what}", self.target))
                .with_expected(expected)
                .with_actual(render_calls(method, calls, |call| {
                    observed(call).unwrap_or_else(|| "nothing".to_string())
                })));
        }
        Ok(())
    }

    fn check_by<T, E, R>(
        &self,
        predicate: &Predicate<T>,
        extract: E,
        what: &str,
        render: R,
    ) -> std::result::Result<(), Failure>
    where
        E: Fn(&Invocation) -> T,
        R: Fn(&T) -> String,
    {
        let observed: Vec<Vec<T>> = self
            .calls
            .iter()
            .map(|calls| calls.iter().map(&extract).collect())
            .collect();
        if predicate(&observed) {
            return Ok(());
        }
        let actual = self
            .methods
            .iter()
            .zip(&observed)
            .map(|(method, values)| {
                if values.is_empty() {
                    return format!(":{method} never called");
                }
                values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| format!(":{method} call #{} {}", i + 1, render(value)))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(self
            .failure(format!(
                "{} received {} message(s) {what}",
                self.target,
                self.method_list()
            ))
            .with_expected("to pass the given validation")
            .with_actual(actual))
    }
}

// ──────────────────── rendering ────────────────────

/// `:a` for one method, `[:a, :b]` for several.
#[must_use]
pub fn render_methods(methods: &[String]) -> String {
    match methods {
        [single] => format!(":{single}"),
        many => format!(
            "[{}]",
            many.iter()
                .map(|m| format!(":{m}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn render_values(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_list(values: &[Value]) -> String {
    format!("[{}]", render_values(values))
}

fn render_args(args: &[Value]) -> String {
    if args.is_empty() {
        "without arguments".to_string()
    } else {
        format!("with {}", render_values(args))
    }
}

fn render_expected_args(args: &[Value]) -> String {
    if args.is_empty() {
        "to be called without arguments".to_string()
    } else {
        render_values(args)
    }
}

fn render_counts(methods: &[String], counts: &[usize]) -> String {
    methods
        .iter()
        .zip(counts)
        .map(|(method, n)| format!(":{method} {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_calls<F>(method: &str, calls: &[Invocation], describe: F) -> String
where
    F: Fn(&Invocation) -> String,
{
    if calls.is_empty() {
        return format!(":{method} never called");
    }
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| format!(":{method} call #{} {}", i + 1, describe(call)))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::object::value::Signal;

    struct Fixture {
        space: ObjectSpace,
        journal: Journal,
        target: ObjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let space = ObjectSpace::new();
            let target = space.spawn_empty(Some("obj"));
            Self {
                space,
                journal: Journal::new(),
                target,
            }
        }

        fn call(&self, method: &str, args: Vec<Value>, result: crate::object::value::CallResult) {
            let id = self
                .journal
                .record(self.target, method, args, vec!["tests.rs:1:1".into()]);
            self.journal.complete(id, &result);
        }

        fn evidence(&self, methods: &[&str]) -> Evidence {
            let methods: Vec<String> = methods.iter().map(ToString::to_string).collect();
            Evidence::collect(&self.journal, &self.space, self.target, &methods)
        }
    }

    #[test]
    fn arity_rules() {
        assert!(Constraint::count(&[1, 2], 2).is_ok());
        assert!(Constraint::count(&[1], 3).is_ok());
        assert!(Constraint::count(&[1, 2], 3).unwrap_err().is_usage());
        assert!(Constraint::count(&[], 1).unwrap_err().is_usage());
        assert!(Constraint::args(args![1, 2, 3], 1).is_ok());
        assert!(Constraint::ordered(1, 1).unwrap_err().is_usage());
        assert!(Constraint::ordered(0, 2).unwrap_err().is_usage());
        assert!(Constraint::raises(vec![], 3).is_ok());
    }

    #[test]
    fn presence_and_negation() {
        let fx = Fixture::new();
        fx.call("a", args![], Ok(Value::Nil));
        assert!(fx.evidence(&["a"]).check_presence(false).is_ok());
        let failure = fx.evidence(&["a", "b"]).check_presence(false).unwrap_err();
        assert!(failure.message.contains("never received"));
        assert_eq!(failure.target.as_deref(), Some("obj"));
        assert!(fx.evidence(&["b", "a"]).check_presence(true).is_err());
        assert!(fx.evidence(&["b"]).check_presence(true).is_ok());
    }

    #[test]
    fn count_is_zippered() {
        let fx = Fixture::new();
        fx.call("a", args![], Ok(Value::Nil));
        fx.call("b", args![], Ok(Value::Nil));
        fx.call("b", args![], Ok(Value::Nil));
        let ev = fx.evidence(&["a", "b"]);
        assert!(Constraint::count(&[1, 2], 2).unwrap().check(&ev).is_ok());
        assert!(Constraint::count(&[2], 2).unwrap().check(&ev).is_err());
        let by = Constraint::count_by(|counts| counts == [1, 2]);
        assert!(by.check(&ev).is_ok());
    }

    #[test]
    fn arguments_single_and_multi() {
        let fx = Fixture::new();
        fx.call("a", args![1, 2], Ok(Value::Nil));
        fx.call("b", args![vec![1]], Ok(Value::Nil));
        assert!(
            Constraint::args(args![1, 2], 1)
                .unwrap()
                .check(&fx.evidence(&["a"]))
                .is_ok()
        );
        let failure = Constraint::args(args![4, 5], 1)
            .unwrap()
            .check(&fx.evidence(&["a"]))
            .unwrap_err();
        assert_eq!(failure.expected.as_deref(), Some("4, 5"));
        assert!(failure.actual.unwrap().contains("with 1, 2"));

        fx.call("a", args![7], Ok(Value::Nil));
        let multi = Constraint::args(args![7, vec![1]], 2).unwrap();
        assert!(multi.check(&fx.evidence(&["a", "b"])).is_ok());
    }

    #[test]
    fn without_arguments_needs_one_bare_call() {
        let fx = Fixture::new();
        fx.call("a", args![1], Ok(Value::Nil));
        assert!(Constraint::WithoutArgs.check(&fx.evidence(&["a"])).is_err());
        fx.call("a", args![], Ok(Value::Nil));
        assert!(Constraint::WithoutArgs.check(&fx.evidence(&["a"])).is_ok());
    }

    #[test]
    fn ordered_counts_runs() {
        let fx = Fixture::new();
        for method in ["a", "b", "x", "a", "b"] {
            fx.call(method, args![], Ok(Value::Nil));
        }
        let ev = fx.evidence(&["a", "b"]);
        assert!(Constraint::ordered(2, 2).unwrap().check(&ev).is_ok());
        assert!(Constraint::ordered(1, 2).unwrap().check(&ev).is_err());
        let reversed = fx.evidence(&["b", "a"]);
        assert!(Constraint::ordered(1, 2).unwrap().check(&reversed).is_err());
    }

    #[test]
    fn raise_and_throw_validators() {
        let fx = Fixture::new();
        fx.call("a", args![], Err(Signal::raise("ArgumentError", "x")));
        fx.call("t", args![], Err(Signal::throw_with("done", 5)));
        let a = fx.evidence(&["a"]);
        assert!(Constraint::raises(vec!["ArgumentError".into()], 1).unwrap().check(&a).is_ok());
        assert!(
            Constraint::raises(vec![("ArgumentError", "x").into()], 1)
                .unwrap()
                .check(&a)
                .is_ok()
        );
        assert!(Constraint::raises(vec!["RuntimeError".into()], 1).unwrap().check(&a).is_err());
        assert!(Constraint::WithoutRaise.check(&a).is_err());
        assert!(Constraint::WithoutThrow.check(&a).is_ok());

        let t = fx.evidence(&["t"]);
        assert!(Constraint::throws(vec!["done".into()], 1).unwrap().check(&t).is_ok());
        assert!(Constraint::throws(vec![], 1).unwrap().check(&t).is_ok());
        assert!(Constraint::throws(vec!["other".into()], 1).unwrap().check(&t).is_err());
        assert!(Constraint::raises(vec![], 1).unwrap().check(&t).is_err());
    }

    #[test]
    fn returns_and_callers() {
        let fx = Fixture::new();
        fx.call("a", args![], Ok(Value::from("ok-1")));
        let ev = fx.evidence(&["a"]);
        assert!(Constraint::returns(vec!["ok-1".into()], 1).unwrap().check(&ev).is_ok());
        assert!(
            Constraint::returns(vec![ValueMatcher::pattern("^ok").unwrap()], 1)
                .unwrap()
                .check(&ev)
                .is_ok()
        );
        assert!(Constraint::returns(vec![1.into()], 1).unwrap().check(&ev).is_err());
        assert!(Constraint::caller(vec!["tests.rs".into()], 1).unwrap().check(&ev).is_ok());
        assert!(Constraint::caller(vec!["other.rs".into()], 1).unwrap().check(&ev).is_err());
    }

    #[test]
    fn raised_call_returns_nil() {
        let fx = Fixture::new();
        fx.call("a", args![], Err(Signal::raise("ArgumentError", "x")));
        let ev = fx.evidence(&["a"]);
        assert!(Constraint::returns(vec![Value::Nil.into()], 1).unwrap().check(&ev).is_ok());
        let failure = Constraint::returns(vec![1.into()], 1)
            .unwrap()
            .check(&ev)
            .unwrap_err();
        assert!(failure.actual.unwrap().contains("nil"));
    }

    #[test]
    fn multi_method_yields_splice_nested_lists() {
        let fx = Fixture::new();
        for (method, yielded) in [("a", args![1, 2]), ("b", args![3])] {
            let id = fx.journal.record(fx.target, method, args![], vec![]);
            fx.journal.set_yielded(id, &yielded);
            fx.journal.complete(id, &Ok(Value::Nil));
        }
        let ab = fx.evidence(&["a", "b"]);
        let nested = args![Value::list(vec![Value::from(vec![1, 2])]), 3];
        assert!(Constraint::yields(nested, 2).unwrap().check(&ab).is_ok());

        // A single method compares the whole expected list as given.
        let a = fx.evidence(&["a"]);
        assert!(Constraint::yields(args![vec![1, 2]], 1).unwrap().check(&a).is_err());
    }

    #[test]
    fn yields_single_multi_and_any() {
        let fx = Fixture::new();
        for (method, yielded) in [("a", args![1, 2]), ("b", args![3])] {
            let id = fx.journal.record(fx.target, method, args![], vec![]);
            fx.journal.set_yielded(id, &yielded);
            fx.journal.complete(id, &Ok(Value::Nil));
        }
        fx.call("c", args![], Ok(Value::Nil));

        let a = fx.evidence(&["a"]);
        assert!(Constraint::yields(args![1, 2], 1).unwrap().check(&a).is_ok());
        assert!(Constraint::yields(args![], 1).unwrap().check(&a).is_ok());
        let ab = fx.evidence(&["a", "b"]);
        assert!(Constraint::yields(args![vec![1, 2], 3], 2).unwrap().check(&ab).is_ok());
        let c = fx.evidence(&["c"]);
        assert!(Constraint::yields(args![], 1).unwrap().check(&c).is_err());
        assert!(Constraint::WithoutYield.check(&c).is_ok());
        assert!(Constraint::WithoutYield.check(&a).is_err());
    }

    #[test]
    fn predicates_see_grouped_observations() {
        let fx = Fixture::new();
        fx.call("a", args![1], Ok(Value::from(10)));
        fx.call("a", args![2], Ok(Value::from(20)));
        let ev = fx.evidence(&["a"]);
        let args_ok = Constraint::args_by(|seen| seen[0] == vec![args![1], args![2]]);
        assert!(args_ok.check(&ev).is_ok());
        let returns_bad = Constraint::returns_by(|seen| seen[0].is_empty());
        let failure = returns_bad.check(&ev).unwrap_err();
        assert!(failure.actual.unwrap().contains("call #2 20"));
    }
}
