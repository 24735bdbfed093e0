//! Test execution engine.
//!
//! Per test: reset → before-hooks → body → after-hooks → validate → restore →
//! reset. The last matching around-hook wraps the three middle steps. The
//! validate and restore steps run no matter how the test ended (pass, failure,
//! skip, declaration error or panic).

#![allow(missing_docs)]

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;

use crate::core::config::RunConfig;
use crate::core::errors::{Result, SpyError};
use crate::core::failure::Failure;
use crate::logger::run_log::{RunEvent, RunLog};
use crate::mocks::session::MockSession;
use crate::object::space::ObjectSpace;
use crate::runner::context::TestContext;
use crate::runner::flow::{FailureSink, Halt, Step};
use crate::runner::hooks::{AroundFn, AroundHook, Hook, HookFilter, HookFn};
use crate::runner::report::{SuiteReport, TestOutcome, TestReport};

#[derive(Clone)]
struct TestCase {
    label: String,
    body: HookFn,
}

/// An ordered set of labelled tests plus their hooks.
#[derive(Clone)]
pub struct Suite {
    name: String,
    config: RunConfig,
    tests: Vec<TestCase>,
    before: Vec<Hook>,
    after: Vec<Hook>,
    around: Vec<AroundHook>,
    before_all: Option<HookFn>,
    after_all: Option<HookFn>,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tests", &self.labels())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("around", &self.around.len())
            .finish_non_exhaustive()
    }
}

impl Suite {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RunConfig::default(),
            tests: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            around: Vec::new(),
            before_all: None,
            after_all: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Test labels in run order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.label.as_str()).collect()
    }

    /// Add a test. Reusing a label replaces the earlier body in place.
    #[must_use]
    pub fn test<F>(mut self, label: &str, body: F) -> Self
    where
        F: Fn(&TestContext) -> Step + Send + Sync + 'static,
    {
        let body: HookFn = Arc::new(body);
        if let Some(existing) = self.tests.iter_mut().find(|t| t.label == label) {
            existing.body = body;
        } else {
            self.tests.push(TestCase {
                label: label.to_string(),
                body,
            });
        }
        self
    }

    #[must_use]
    pub fn before<F>(mut self, filter: HookFilter, run: F) -> Self
    where
        F: Fn(&TestContext) -> Step + Send + Sync + 'static,
    {
        self.before.push(Hook {
            filter,
            run: Arc::new(run),
        });
        self
    }

    #[must_use]
    pub fn after<F>(mut self, filter: HookFilter, run: F) -> Self
    where
        F: Fn(&TestContext) -> Step + Send + Sync + 'static,
    {
        self.after.push(Hook {
            filter,
            run: Arc::new(run),
        });
        self
    }

    #[must_use]
    pub fn around<F>(mut self, filter: HookFilter, run: F) -> Self
    where
        F: Fn(&TestContext, &mut dyn FnMut() -> Step) -> Step + Send + Sync + 'static,
    {
        let run: AroundFn = Arc::new(run);
        self.around.push(AroundHook { filter, run });
        self
    }

    /// Runs once before the first test. Interception made here is undone
    /// before the first test starts; objects it spawns stay alive.
    #[must_use]
    pub fn before_all<F>(mut self, run: F) -> Self
    where
        F: Fn(&TestContext) -> Step + Send + Sync + 'static,
    {
        self.before_all = Some(Arc::new(run));
        self
    }

    /// Runs once after the last test, even when tests failed.
    #[must_use]
    pub fn after_all<F>(mut self, run: F) -> Self
    where
        F: Fn(&TestContext) -> Step + Send + Sync + 'static,
    {
        self.after_all = Some(Arc::new(run));
        self
    }

    // ──────────────────── running ────────────────────

    /// Run in a fresh object space, logging where the config says.
    pub fn run(&self) -> Result<SuiteReport> {
        self.run_in(&ObjectSpace::new(), &RunLog::open(&self.config.log))
    }

    /// Run against an existing space. Errors only for an invalid config.
    pub fn run_in(&self, space: &ObjectSpace, log: &RunLog) -> Result<SuiteReport> {
        self.config.validate()?;
        let only = self.config.only_matcher()?;
        let started = Instant::now();
        let session = MockSession::new(space.clone());

        let selected: Vec<&TestCase> = self
            .tests
            .iter()
            .filter(|case| only.as_ref().is_none_or(|re: &Regex| re.is_match(&case.label)))
            .collect();
        let mut report = SuiteReport {
            suite: self.name.clone(),
            filtered: self.tests.len() - selected.len(),
            ..SuiteReport::default()
        };
        log.send(&RunEvent::SuiteStarted {
            suite: self.name.clone(),
            tests: selected.len(),
            config_hash: self.config.stable_hash()?,
        });

        let setup = self.run_suite_hook(self.before_all.as_ref(), "before_all", &session);
        let setup_ok = setup.is_empty();
        report.suite_failures.extend(setup);

        if setup_ok {
            for case in selected {
                let test = self.run_test(case, &session, log);
                let failed = test.outcome.is_failed();
                report.tests.push(test);
                if failed && self.config.runner.fail_fast {
                    report.stopped_early = true;
                    break;
                }
            }
        }

        let teardown = self.run_suite_hook(self.after_all.as_ref(), "after_all", &session);
        report.suite_failures.extend(teardown);
        report.duration_ms = elapsed_ms(started);

        log.send(&RunEvent::SuiteFinished {
            suite: self.name.clone(),
            tests: report.tests.len(),
            failed: report.failed(),
            duration_ms: report.duration_ms,
        });
        Ok(report)
    }

    fn run_suite_hook(
        &self,
        hook: Option<&HookFn>,
        label: &str,
        session: &MockSession,
    ) -> Vec<Failure> {
        let Some(hook) = hook else {
            return Vec::new();
        };
        session.reset();
        let ctx = TestContext::new(&self.name, label, session.clone(), FailureSink::new(true));
        let step = guarded(|| hook(&ctx));
        if let Err(Halt::Error(error)) = step {
            ctx.sink().record(Failure::new(format!("{label}: {error}")));
        }
        session.reset();
        ctx.sink().take()
    }

    fn run_test(&self, case: &TestCase, session: &MockSession, log: &RunLog) -> TestReport {
        let started = Instant::now();
        log.send(&RunEvent::TestStarted {
            suite: self.name.clone(),
            test: case.label.clone(),
        });

        session.reset();
        let sink = FailureSink::new(self.config.runner.continue_on_failure);
        let ctx = TestContext::new(&self.name, &case.label, session.clone(), sink.clone());

        let around = self
            .around
            .iter()
            .rev()
            .find(|hook| hook.filter.matches(&case.label));
        let step = match around {
            Some(hook) => guarded(|| {
                let mut resume = || self.run_sequence(case, &ctx);
                (hook.run)(&ctx, &mut resume)
            }),
            None => guarded(|| self.run_sequence(case, &ctx)),
        };

        let mut error_code = None;
        if let Err(Halt::Error(error)) = &step {
            error_code = Some(error.code().to_string());
            sink.record(Failure::new(error.to_string()).with_target(case.label.clone()));
        }

        for failure in session.validate_expectations() {
            sink.record(failure);
        }
        let restored = session.restore_all();
        session.reset();

        let failures = sink.take();
        for failure in &failures {
            log.send(&RunEvent::ExpectationFailed {
                suite: self.name.clone(),
                test: case.label.clone(),
                message: failure.message.clone(),
                site: failure.callers.first().cloned(),
            });
        }
        let failure_count = failures.len();
        let outcome = if let Some(origin) = ctx.skipped() {
            TestOutcome::Skipped { origin }
        } else if failures.is_empty() {
            TestOutcome::Passed
        } else {
            TestOutcome::Failed { failures }
        };

        let duration_ms = elapsed_ms(started);
        log.send(&RunEvent::TestFinished {
            suite: self.name.clone(),
            test: case.label.clone(),
            outcome: outcome.label().to_string(),
            failures: failure_count,
            restored,
            duration_ms,
            error_code,
        });
        TestReport {
            label: case.label.clone(),
            outcome,
            restored,
            duration_ms,
        }
    }

    /// Before-hooks, body, after-hooks.
    ///
    /// A halted before-hook skips the body. A stopped body still runs the
    /// after-hooks; a skipped or errored one does not.
    fn run_sequence(&self, case: &TestCase, ctx: &TestContext) -> Step {
        for hook in self.before.iter().filter(|h| h.filter.matches(&case.label)) {
            (hook.run)(ctx)?;
        }
        let body = (case.body)(ctx);
        if matches!(body, Err(Halt::Skip { .. } | Halt::Error(_))) {
            return body;
        }
        for hook in self.after.iter().filter(|h| h.filter.matches(&case.label)) {
            (hook.run)(ctx)?;
        }
        body
    }
}

/// Turn a panic into a declaration-style error so restoration still runs.
fn guarded<F>(run: F) -> Step
where
    F: FnOnce() -> Step,
{
    catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        Err(Halt::Error(SpyError::Panicked {
            details: panic_message(payload.as_ref()),
        }))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
