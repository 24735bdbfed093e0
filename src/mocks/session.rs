//! Per-test mocking session: the proxy/spy/stub/mock/double primitives.
//!
//! The session owns the interceptor for one object space plus the
//! expectations and doubles created during the current test. The engine
//! validates, restores and resets it at every test boundary.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{Result, SpyError};
use crate::core::failure::Failure;
use crate::expect::expectation::Expectation;
use crate::mocks::behavior::{MappedStub, Stub, StubGroup};
use crate::mocks::interceptor::Interceptor;
use crate::mocks::journal::{Invocation, Journal};
use crate::object::space::{ObjectId, ObjectSpace, Visibility};
use crate::object::value::Value;

#[derive(Debug, Default)]
struct SessionState {
    expectations: Vec<Expectation>,
    doubles: Vec<ObjectId>,
}

/// Mocking primitives for one test at a time.
#[derive(Debug, Clone)]
pub struct MockSession {
    interceptor: Interceptor,
    state: Arc<Mutex<SessionState>>,
}

impl MockSession {
    #[must_use]
    pub fn new(space: ObjectSpace) -> Self {
        Self {
            interceptor: Interceptor::new(space),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    #[must_use]
    pub const fn space(&self) -> &ObjectSpace {
        self.interceptor.space()
    }

    #[must_use]
    pub const fn journal(&self) -> &Journal {
        self.interceptor.journal()
    }

    #[must_use]
    pub const fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Journal entries for `target` at this moment.
    #[must_use]
    pub fn calls(&self, target: ObjectId) -> Vec<Invocation> {
        self.journal().query(target)
    }

    // ──────────────────── proxies ────────────────────

    /// Record calls to `methods` and pass them through to the originals.
    pub fn proxy(&self, target: ObjectId, methods: &[&str]) -> Result<()> {
        if methods.is_empty() {
            return Err(SpyError::usage("proxy", "at least one method name required"));
        }
        for method in methods {
            self.interceptor.passthrough(target, method)?;
        }
        Ok(())
    }

    /// Same as [`proxy`](Self::proxy); reads better before `verify(..).received`.
    pub fn spy(&self, target: ObjectId, methods: &[&str]) -> Result<()> {
        self.proxy(target, methods)
    }

    // ──────────────────── stubs ────────────────────

    /// Replace `name` on `target`. A dotted name (`a.b.c`) builds stand-in
    /// objects for the leading segments; the returned stub is the last one.
    pub fn stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.stub_at(target, name, None)
    }

    pub fn public_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.stub_at(target, name, Some(Visibility::Public))
    }

    pub fn protected_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.stub_at(target, name, Some(Visibility::Protected))
    }

    pub fn private_stub(&self, target: ObjectId, name: &str) -> Result<Stub> {
        self.stub_at(target, name, Some(Visibility::Private))
    }

    fn stub_at(
        &self,
        target: ObjectId,
        name: &str,
        visibility: Option<Visibility>,
    ) -> Result<Stub> {
        let segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(SpyError::usage("stub", format!("invalid member name {name:?}")));
        }
        let Some((last, leading)) = segments.split_last() else {
            return Err(SpyError::usage("stub", "member name required"));
        };

        let mut current = target;
        for segment in leading {
            let stand_in = self.new_double(Some(segment));
            self.interceptor.replace_with_value(
                current,
                segment,
                Value::Object(stand_in),
                visibility,
            )?;
            current = stand_in;
        }
        self.interceptor.replace(current, last, visibility)
    }

    /// Stub several members sharing each later declaration.
    pub fn stubs(&self, target: ObjectId, names: &[&str]) -> Result<StubGroup> {
        if names.is_empty() {
            return Err(SpyError::usage("stubs", "at least one member name required"));
        }
        let stubs = names
            .iter()
            .map(|name| self.stub(target, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(StubGroup::new(stubs))
    }

    /// Stub one member per entry with a fixed return value.
    pub fn stub_map(&self, target: ObjectId, entries: &[(&str, Value)]) -> Result<MappedStub> {
        if entries.is_empty() {
            return Err(SpyError::usage("stub", "empty mapping"));
        }
        let stubs = entries
            .iter()
            .map(|(name, value)| self.stub(target, name)?.try_with_any(Some(value.clone()), None))
            .collect::<Result<Vec<_>>>()?;
        Ok(MappedStub::new(stubs))
    }

    // ──────────────────── mocks ────────────────────

    /// Stub `name` and expect it to be received.
    #[track_caller]
    pub fn mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        let site = caller_site();
        self.mock_at(target, name, None, site)
    }

    #[track_caller]
    pub fn public_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        let site = caller_site();
        self.mock_at(target, name, Some(Visibility::Public), site)
    }

    #[track_caller]
    pub fn protected_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        let site = caller_site();
        self.mock_at(target, name, Some(Visibility::Protected), site)
    }

    #[track_caller]
    pub fn private_mock(&self, target: ObjectId, name: &str) -> Result<Stub> {
        let site = caller_site();
        self.mock_at(target, name, Some(Visibility::Private), site)
    }

    fn mock_at(
        &self,
        target: ObjectId,
        name: &str,
        visibility: Option<Visibility>,
        site: String,
    ) -> Result<Stub> {
        let stub = self.stub_at(target, name, visibility)?;
        self.register(Expectation::new(stub.target(), &[stub.method()], false, site)?);
        Ok(stub)
    }

    #[track_caller]
    pub fn mocks(&self, target: ObjectId, names: &[&str]) -> Result<StubGroup> {
        let site = caller_site();
        let group = self.stubs(target, names)?;
        for stub in group.stubs() {
            self.register(Expectation::new(stub.target(), &[stub.method()], false, site.clone())?);
        }
        Ok(group)
    }

    #[track_caller]
    pub fn mock_map(&self, target: ObjectId, entries: &[(&str, Value)]) -> Result<MappedStub> {
        let site = caller_site();
        let mapped = self.stub_map(target, entries)?;
        for stub in mapped.stubs() {
            self.register(Expectation::new(stub.target(), &[stub.method()], false, site.clone())?);
        }
        Ok(mapped)
    }

    // ──────────────────── doubles ────────────────────

    /// Empty double. Released at the end of the test.
    pub fn double(&self, name: Option<&str>) -> ObjectId {
        self.new_double(name)
    }

    /// Double answering each listed member with `nil`.
    pub fn double_with(&self, name: Option<&str>, members: &[&str]) -> Result<(ObjectId, StubGroup)> {
        let double = self.new_double(name);
        let group = if members.is_empty() {
            StubGroup::new(Vec::new())
        } else {
            self.stubs(double, members)?
        };
        Ok((double, group))
    }

    /// Double answering each member with its value.
    pub fn double_map(&self, name: Option<&str>, entries: &[(&str, Value)]) -> Result<ObjectId> {
        let double = self.new_double(name);
        if !entries.is_empty() {
            self.stub_map(double, entries)?;
        }
        Ok(double)
    }

    fn new_double(&self, name: Option<&str>) -> ObjectId {
        let id = self.space().spawn_double(name);
        self.state.lock().doubles.push(id);
        id
    }

    // ──────────────────── expectations ────────────────────

    /// Declare that `target` should (or, negated, should not) receive
    /// `methods`. Each method is proxied so calls are journaled.
    pub fn expect_to_receive(
        &self,
        target: ObjectId,
        methods: &[&str],
        negated: bool,
        site: impl Into<String>,
    ) -> Result<Expectation> {
        let expectation = Expectation::new(target, methods, negated, site)?;
        for method in expectation.methods() {
            // Negated expectations on members the target lacks still hold.
            match self.interceptor.passthrough(target, &method) {
                Err(SpyError::CapabilityAbsent { .. }) if negated => {}
                other => other?,
            }
        }
        self.register(expectation.clone());
        Ok(expectation)
    }

    fn register(&self, expectation: Expectation) {
        self.state.lock().expectations.push(expectation);
    }

    #[must_use]
    pub fn pending_expectations(&self) -> usize {
        self.state.lock().expectations.len()
    }

    /// Validate and forget every expectation declared so far.
    pub fn validate_expectations(&self) -> Vec<Failure> {
        let expectations = std::mem::take(&mut self.state.lock().expectations);
        expectations
            .iter()
            .filter_map(|expectation| expectation.validate(self.journal(), self.space()))
            .collect()
    }

    // ──────────────────── lifecycle ────────────────────

    /// Undo all interception. Returns the number of members restored.
    pub fn restore_all(&self) -> usize {
        self.interceptor.restore_all()
    }

    /// Clean slate: restore, drop expectations, release doubles and clear
    /// the journal. Returns the number of members restored.
    pub fn reset(&self) -> usize {
        let restored = self.interceptor.reset();
        let doubles = {
            let mut state = self.state.lock();
            state.expectations.clear();
            std::mem::take(&mut state.doubles)
        };
        for double in doubles {
            self.space().release(double);
        }
        restored
    }
}

#[track_caller]
fn caller_site() -> String {
    let location = std::panic::Location::caller();
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::object::space::ClassDef;

    fn setup() -> (MockSession, ObjectId) {
        let space = ObjectSpace::new();
        let class = ClassDef::new("User")
            .public("name", |_| Ok(Value::from("ann")))
            .private("token", |_| Ok(Value::from("t0k")))
            .shared();
        let user = space.spawn(&class);
        (MockSession::new(space), user)
    }

    #[test]
    fn stub_without_behavior_returns_nil() {
        let (session, user) = setup();
        let _ = session.stub(user, "a").unwrap();
        assert_eq!(session.space().send(user, "a", args![]), Ok(Value::Nil));
    }

    #[test]
    fn chained_stub_builds_stand_ins() {
        let (session, user) = setup();
        let _ = session
            .stub(user, "account.owner.name")
            .unwrap()
            .with_any_value("bob");
        let space = session.space();
        let account = space.send(user, "account", args![]).unwrap();
        let owner = space
            .send(account.as_object().unwrap(), "owner", args![])
            .unwrap();
        assert_eq!(
            space.send(owner.as_object().unwrap(), "name", args![]),
            Ok(Value::from("bob"))
        );
        assert!(session.stub(user, "a..b").unwrap_err().is_usage());
    }

    #[test]
    fn mapping_stubs_refuse_constraints() {
        let (session, user) = setup();
        let mapped = session
            .stub_map(user, &[("a", Value::from(1)), ("b", Value::from(2))])
            .unwrap();
        assert!(mapped.with(args![1]).is_err());
        assert_eq!(session.space().send(user, "b", args![]), Ok(Value::from(2)));
    }

    #[test]
    fn visibility_variants_force_level() {
        let (session, user) = setup();
        let _ = session.private_stub(user, "name").unwrap();
        assert!(session.space().send(user, "name", args![]).is_err());
        let _ = session.public_stub(user, "token").unwrap();
        assert!(session.space().send(user, "token", args![]).is_ok());
        session.reset();
        assert!(session.space().send(user, "name", args![]).is_ok());
        assert!(session.space().send(user, "token", args![]).is_err());
    }

    #[test]
    fn mock_fails_when_never_called() {
        let (session, user) = setup();
        let _ = session.mock(user, "a").unwrap();
        let failures = session.validate_expectations();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].callers[0].contains("session.rs"));
    }

    #[test]
    fn mock_passes_when_called_once() {
        let (session, user) = setup();
        let _ = session.mocks(user, &["a", "b"]).unwrap().with_any_value(1);
        session.space().send(user, "a", args![]).unwrap();
        session.space().send(user, "b", args![]).unwrap();
        assert!(session.validate_expectations().is_empty());
        assert_eq!(session.pending_expectations(), 0);
    }

    #[test]
    fn proxy_skips_doubles_and_stubbed_members() {
        let (session, user) = setup();
        let double = session.double(Some("d"));
        session.proxy(double, &["anything"]).unwrap();
        let _ = session.stub(user, "name").unwrap().with_any_value("stubbed");
        session.proxy(user, &["name"]).unwrap();
        assert_eq!(
            session.space().send(user, "name", args![]),
            Ok(Value::from("stubbed"))
        );
        assert_eq!(session.calls(user).len(), 1);
    }

    #[test]
    fn expectation_on_absent_member_needs_capability() {
        let (session, user) = setup();
        let err = session.expect_to_receive(user, &["ghost"], false, "").unwrap_err();
        assert!(matches!(err, SpyError::CapabilityAbsent { .. }));
        assert!(session.expect_to_receive(user, &["ghost"], true, "").is_ok());
    }

    #[test]
    fn reset_releases_doubles() {
        let (session, _) = setup();
        let double = session.double_map(Some("cfg"), &[("port", Value::from(80))]).unwrap();
        assert_eq!(session.space().send(double, "port", args![]), Ok(Value::from(80)));
        session.reset();
        assert!(!session.space().contains(double));
    }
}
