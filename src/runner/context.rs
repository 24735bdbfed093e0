//! The handle a test body or hook works through.

#![allow(missing_docs)]

use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::Result;
use crate::core::failure::Failure;
use crate::expect::expectation::Expectation;
use crate::expect::verify::Verification;
use crate::mocks::behavior::{MappedStub, Stub, StubGroup};
use crate::mocks::journal::Invocation;
use crate::mocks::session::MockSession;
use crate::object::space::{ObjectId, ObjectSpace};
use crate::object::value::Value;
use crate::runner::flow::{FailureSink, Halt, Step};

/// Per-test context: mocking primitives, expectations, `fail` and `skip`.
#[derive(Debug, Clone)]
pub struct TestContext {
    suite: String,
    label: String,
    session: MockSession,
    sink: FailureSink,
    skipped: Arc<Mutex<Option<String>>>,
}

impl TestContext {
    pub(crate) fn new(suite: &str, label: &str, session: MockSession, sink: FailureSink) -> Self {
        Self {
            suite: suite.to_string(),
            label: label.to_string(),
            session,
            sink,
            skipped: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn space(&self) -> &ObjectSpace {
        self.session.space()
    }

    #[must_use]
    pub const fn session(&self) -> &MockSession {
        &self.session
    }

    #[must_use]
    pub const fn sink(&self) -> &FailureSink {
        &self.sink
    }

    /// Journal entries recorded for `target` so far.
    #[must_use]
    pub fn calls(&self, target: ObjectId) -> Vec<Invocation> {
        self.session.calls(target)
    }

    // ──────────────────── doubles and interception ────────────────────

    pub fn proxy(&self, target: ObjectId, methods: &[&str]) -> Result<()> {
        self.session.proxy(target, methods)
    }

    pub fn spy(&self, target: ObjectId, methods: &[&str]) -> Result<()> {
        self.session.spy(target, methods)
    }

    pub fn stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.stub(target, name)
    }

    pub fn public_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.public_stub(target, name)
    }

    pub fn protected_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.protected_stub(target, name)
    }

    pub fn private_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.private_stub(target, name)
    }

    pub fn stubs(&self, target: ObjectId, names: &[&str]) -> Result<StubGroup> {
        self.session.stubs(target, names)
    }

    pub fn stub_map(&self, target: ObjectId, entries: &[(&str, Value)]) -> Result<MappedStub> {
        self.session.stub_map(target, entries)
    }

    #[track_caller]
    pub fn mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.mock(target, name)
    }

    #[track_caller]
    pub fn public_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.public_mock(target, name)
    }

    #[track_caller]
    pub fn protected_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.protected_mock(target, name)
    }

    #[track_caller]
    pub fn private_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.session.private_mock(target, name)
    }

    #[track_caller]
    pub fn mocks(&self, target: ObjectId, names: &[&str]) -> Result<StubGroup> {
        self.session.mocks(target, names)
    }

    #[track_caller]
    pub fn mock_map(&self, target: ObjectId, entries: &[(&str, Value)]) -> Result<MappedStub> {
        self.session.mock_map(target, entries)
    }

    pub fn double(&self, name: Option<&str>) -> ObjectId {
        self.session.double(name)
    }

    pub fn double_with(
        &self,
        name: Option<&str>,
        members: &[&str],
    ) -> Result<(ObjectId, StubGroup)> {
        self.session.double_with(name, members)
    }

    pub fn double_map(&self, name: Option<&str>, entries: &[(&str, Value)]) -> Result<ObjectId> {
        self.session.double_map(name, entries)
    }

    // ──────────────────── expectations ────────────────────

    /// Start a deferred expectation, validated after the test body.
    #[must_use]
    pub const fn expect(&self, target: ObjectId) -> ExpectTarget<'_> {
        ExpectTarget { ctx: self, target }
    }

    /// Start an immediate check against calls recorded so far.
    #[must_use]
    pub const fn verify(&self, target: ObjectId) -> VerifyTarget<'_> {
        VerifyTarget { ctx: self, target }
    }

    // ──────────────────── control ────────────────────

    /// Record a failure with free text.
    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) -> Step {
        let failure = Failure::new(message).with_caller(site(Location::caller()));
        self.sink.push(failure)
    }

    /// Record a prepared failure.
    #[track_caller]
    pub fn fail_with(&self, failure: Failure) -> Step {
        let failure = if failure.callers.is_empty() {
            failure.with_caller(site(Location::caller()))
        } else {
            failure
        };
        self.sink.push(failure)
    }

    /// Mark the test skipped and stop it. Meant to be returned or `?`-ed.
    #[track_caller]
    pub fn skip(&self) -> Step {
        let origin = site(Location::caller());
        *self.skipped.lock() = Some(origin.clone());
        Err(Halt::Skip { origin })
    }

    /// Origin of the `skip` call, when the test was skipped.
    #[must_use]
    pub fn skipped(&self) -> Option<String> {
        self.skipped.lock().clone()
    }
}

/// `ctx.expect(target)` builder.
#[derive(Debug, Clone, Copy)]
pub struct ExpectTarget<'c> {
    ctx: &'c TestContext,
    target: ObjectId,
}

impl ExpectTarget<'_> {
    #[track_caller]
    pub fn to_receive(&self, methods: &[&str]) -> std::result::Result<Expectation, Halt> {
        let site = site(Location::caller());
        Ok(self
            .ctx
            .session
            .expect_to_receive(self.target, methods, false, site)?)
    }

    #[track_caller]
    pub fn not_to_receive(&self, methods: &[&str]) -> std::result::Result<Expectation, Halt> {
        let site = site(Location::caller());
        Ok(self
            .ctx
            .session
            .expect_to_receive(self.target, methods, true, site)?)
    }
}

/// `ctx.verify(target)` builder.
#[derive(Debug, Clone, Copy)]
pub struct VerifyTarget<'c> {
    ctx: &'c TestContext,
    target: ObjectId,
}

impl VerifyTarget<'_> {
    #[track_caller]
    pub fn received(&self, methods: &[&str]) -> std::result::Result<Verification, Halt> {
        self.check(methods, false, &site(Location::caller()))
    }

    #[track_caller]
    pub fn not_received(&self, methods: &[&str]) -> std::result::Result<Verification, Halt> {
        self.check(methods, true, &site(Location::caller()))
    }

    fn check(
        &self,
        methods: &[&str],
        negated: bool,
        site: &str,
    ) -> std::result::Result<Verification, Halt> {
        Verification::new(
            self.ctx.session.journal(),
            self.ctx.space(),
            self.target,
            methods,
            negated,
            site,
            self.ctx.sink.clone(),
        )
    }
}

fn site(location: &Location<'_>) -> String {
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}
