//! Method interceptor: installs journaling wrappers on object members.
//!
//! Two modes:
//! - **passthrough** (spy/proxy): record, then run the original member;
//! - **replace** (stub/mock): record, then run the stub's resolved behavior.
//!
//! A `(target, method)` pair is wrapped at most once per test. Every first
//! install is snapshotted by the [`RestorationManager`] so the target can be
//! put back exactly as it was.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{Result, SpyError};
use crate::mocks::behavior::{Behavior, Stub};
use crate::mocks::journal::{EntryId, Journal};
use crate::mocks::restore::RestorationManager;
use crate::object::space::{
    Block, Call, Callable, METHOD_MISSING, Member, ObjectId, ObjectSpace, Visibility,
};
use crate::object::value::{CallResult, Value};

/// Interception mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Passthrough,
    Replace,
}

type Key = (ObjectId, String);

#[derive(Debug, Default)]
struct InterceptState {
    proxied: HashSet<Key>,
    stubs: HashMap<Key, Stub>,
}

/// Shared interceptor handle; owns the journal and the restoration manager
/// for one object space.
#[derive(Debug, Clone)]
pub struct Interceptor {
    space: ObjectSpace,
    journal: Journal,
    restorer: RestorationManager,
    state: Arc<Mutex<InterceptState>>,
}

impl Interceptor {
    #[must_use]
    pub fn new(space: ObjectSpace) -> Self {
        Self {
            restorer: RestorationManager::new(space.clone()),
            journal: Journal::new(),
            space,
            state: Arc::new(Mutex::new(InterceptState::default())),
        }
    }

    #[must_use]
    pub const fn space(&self) -> &ObjectSpace {
        &self.space
    }

    #[must_use]
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Generic entry point. Replace mode returns the member's stub handle,
    /// with `behavior` (when given) as its catch-all.
    pub fn intercept(
        &self,
        target: ObjectId,
        method: &str,
        mode: Mode,
        behavior: Option<Behavior>,
    ) -> Result<Option<Stub>> {
        match mode {
            Mode::Passthrough => {
                if behavior.is_some() {
                    return Err(SpyError::usage(
                        "intercept",
                        "passthrough interception runs the original; no behavior accepted",
                    ));
                }
                self.passthrough(target, method)?;
                Ok(None)
            }
            Mode::Replace => {
                let stub = self.replace(target, method, None)?;
                if let Some(behavior) = behavior {
                    stub.try_with_any(None, Some(behavior))?;
                }
                Ok(Some(stub))
            }
        }
    }

    #[must_use]
    pub fn is_proxied(&self, target: ObjectId, method: &str) -> bool {
        self.state
            .lock()
            .proxied
            .contains(&(target, method.to_string()))
    }

    #[must_use]
    pub fn is_stubbed(&self, target: ObjectId, method: &str) -> bool {
        self.state
            .lock()
            .stubs
            .contains_key(&(target, method.to_string()))
    }

    /// Record-then-call-original wrapper.
    ///
    /// Doubles and stubbed members are left alone since their wrappers already
    /// record. Repeated calls are no-ops.
    pub fn passthrough(&self, target: ObjectId, method: &str) -> Result<()> {
        if !self.space.contains(target) {
            return Err(SpyError::UnknownObject { id: target.raw() });
        }
        if self.space.is_double(target)
            || self.is_stubbed(target, method)
            || self.is_proxied(target, method)
        {
            return Ok(());
        }
        let Some(original) = self.space.resolve(target, method) else {
            return Err(SpyError::CapabilityAbsent {
                target: self.space.inspect(target),
                method: method.to_string(),
            });
        };

        self.restorer.track(target, method);
        let visibility = original.visibility;
        let journal = self.journal.clone();
        let callable: Callable = Arc::new(move |call: &mut Call<'_>| {
            journaled(&journal, call, Some(original.clone()), |call| {
                (original.callable)(call)
            })
        });
        self.space
            .define_override(target, method, Member::new(callable, visibility))?;
        self.state
            .lock()
            .proxied
            .insert((target, method.to_string()));
        Ok(())
    }

    /// Record-then-run-behavior wrapper. Returns the member's stub; a second
    /// call for the same pair returns the same stub without rewrapping.
    ///
    /// The wrapper takes the member's original visibility (public when it was
    /// absent) unless `visibility` forces a level.
    pub fn replace(
        &self,
        target: ObjectId,
        method: &str,
        visibility: Option<Visibility>,
    ) -> Result<Stub> {
        if !self.space.contains(target) {
            return Err(SpyError::UnknownObject { id: target.raw() });
        }
        let key = (target, method.to_string());
        let existing = self.state.lock().stubs.get(&key).cloned();
        if let Some(stub) = existing {
            if let Some(visibility) = visibility {
                self.space
                    .set_override_visibility(target, method, visibility);
            }
            return Ok(stub);
        }

        self.restorer.track(target, method);
        // A proxy wrapper may already sit in the slot; behaviors must see the
        // member that was there before any interception.
        let original = self
            .restorer
            .snapshot(target, method)
            .and_then(|snapshot| snapshot.resolved);
        let level = visibility
            .or_else(|| original.as_ref().map(|member| member.visibility))
            .unwrap_or(Visibility::Public);

        let stub = Stub::new(target, method);
        let journal = self.journal.clone();
        let responder = stub.clone();
        let callable: Callable = Arc::new(move |call: &mut Call<'_>| {
            journaled(&journal, call, original.clone(), |call| {
                responder.respond(call)
            })
        });
        self.space
            .define_override(target, method, Member::new(callable, level))?;

        let mut state = self.state.lock();
        state.proxied.remove(&key);
        state.stubs.insert(key, stub.clone());
        Ok(stub)
    }

    /// Replace `method` with a fixed return value.
    pub fn replace_with_value(
        &self,
        target: ObjectId,
        method: &str,
        value: Value,
        visibility: Option<Visibility>,
    ) -> Result<Stub> {
        let stub = self.replace(target, method, visibility)?;
        stub.try_with_any(Some(value), None)
    }

    /// Revert every interception. Returns the number of members restored.
    pub fn restore_all(&self) -> usize {
        let restored = self.restorer.restore_all();
        let mut state = self.state.lock();
        state.proxied.clear();
        state.stubs.clear();
        restored
    }

    /// Restore everything and empty the journal.
    pub fn reset(&self) -> usize {
        let restored = self.restore_all();
        self.journal.clear();
        restored
    }
}

/// Journal one wrapped call around `run`.
///
/// Calls to `method_missing` produce a second entry attributed to the
/// requested name. The caller's block is wrapped so yields are captured, and
/// the outcome is recorded before being handed back unchanged.
fn journaled<F>(journal: &Journal, call: &mut Call<'_>, original: Option<Member>, run: F) -> CallResult
where
    F: FnOnce(&mut Call<'_>) -> CallResult,
{
    let callers = call.space().call_frames();
    let mut entries: Vec<EntryId> = vec![journal.record(
        call.receiver(),
        call.method(),
        call.args().to_vec(),
        callers.clone(),
    )];
    if call.method() == METHOD_MISSING
        && let Some((Value::Sym(requested), rest)) = call.args().split_first()
    {
        entries.push(journal.record(call.receiver(), requested, rest.to_vec(), callers));
    }

    let block = call.block().cloned().map(|inner| {
        let journal = journal.clone();
        let entries = entries.clone();
        Arc::new(move |values: &[Value]| {
            for id in &entries {
                journal.set_yielded(*id, values);
            }
            inner(values)
        }) as Block
    });

    let mut forwarded = call.forward(block, original);
    let result = run(&mut forwarded);
    for id in &entries {
        journal.complete(*id, &result);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::object::space::ClassDef;
    use crate::object::value::Signal;

    fn setup() -> (Interceptor, ObjectId) {
        let space = ObjectSpace::new();
        let class = ClassDef::new("Widget")
            .public("a", |call| Ok(Value::List(call.args().to_vec())))
            .public("boom", |_| Err(Signal::raise("ArgumentError", "x")))
            .private("hidden", |_| Ok(Value::sym("hidden")))
            .public("each", |call| {
                call.yield_values(&args![1])?;
                call.yield_values(&args![2, 3])
            })
            .shared();
        let obj = space.spawn(&class);
        (Interceptor::new(space), obj)
    }

    #[test]
    fn passthrough_records_and_calls_original() {
        let (icp, obj) = setup();
        icp.passthrough(obj, "a").unwrap();
        icp.passthrough(obj, "a").unwrap();
        let space = icp.space();
        assert_eq!(space.send(obj, "a", args![1]), Ok(Value::from(vec![1])));
        assert_eq!(space.send(obj, "a", args![2]), Ok(Value::from(vec![2])));

        let entries = icp.journal().query(obj);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].arguments, args![1]);
        assert_eq!(entries[1].returned(), Some(&Value::from(vec![2])));
        assert!(!entries[0].callers.is_empty());
    }

    #[test]
    fn passthrough_requires_resolving_member() {
        let (icp, obj) = setup();
        let err = icp.passthrough(obj, "nope").unwrap_err();
        assert_eq!(err.code(), "SPY-2002");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn raised_errors_are_captured_and_reraised() {
        let (icp, obj) = setup();
        icp.passthrough(obj, "boom").unwrap();
        let err = icp.space().send(obj, "boom", args![]).unwrap_err();
        assert_eq!(err, Signal::raise("ArgumentError", "x"));
        let entry = &icp.journal().query(obj)[0];
        assert_eq!(entry.raised().map(|e| e.message.as_str()), Some("x"));
    }

    #[test]
    fn yields_are_captured_last_wins() {
        let (icp, obj) = setup();
        icp.passthrough(obj, "each").unwrap();
        icp.space()
            .send_with_block(obj, "each", args![], |_| Ok(Value::Nil))
            .unwrap();
        let entry = &icp.journal().query(obj)[0];
        assert_eq!(entry.yielded, Some(args![2, 3]));
    }

    #[test]
    fn wrapper_keeps_original_visibility() {
        let (icp, obj) = setup();
        icp.passthrough(obj, "hidden").unwrap();
        assert!(icp.space().send(obj, "hidden", args![]).is_err());
        assert_eq!(
            icp.space().send_private(obj, "hidden", args![]),
            Ok(Value::sym("hidden"))
        );
        assert_eq!(icp.journal().len(), 1);
    }

    #[test]
    fn replace_is_idempotent_and_keeps_bindings() {
        let (icp, obj) = setup();
        let first = icp.replace(obj, "a", None).unwrap();
        let _ = first.with_value(args![1], Value::sym("one"));
        let second = icp.replace(obj, "a", None).unwrap();
        let _ = second.with_any_value(Value::sym("any"));

        let space = icp.space();
        assert_eq!(space.send(obj, "a", args![1]), Ok(Value::sym("one")));
        assert_eq!(space.send(obj, "a", args![2]), Ok(Value::sym("any")));
        assert!(icp.is_stubbed(obj, "a"));
    }

    #[test]
    fn stubbed_behavior_can_call_original() {
        let (icp, obj) = setup();
        icp.passthrough(obj, "a").unwrap();
        let stub = icp.replace(obj, "a", None).unwrap();
        let _ = stub.with_any(|call| {
            let inner = call.call_original()?;
            Ok(Value::List(vec![Value::sym("wrapped"), inner]))
        });
        let got = icp.space().send(obj, "a", args![5]).unwrap();
        assert_eq!(
            got,
            Value::List(vec![Value::sym("wrapped"), Value::from(vec![5])])
        );
        // The stub replaced the proxy wrapper, so one entry per call.
        assert_eq!(icp.journal().len(), 1);
    }

    #[test]
    fn stubbing_absent_member_and_restoring() {
        let (icp, obj) = setup();
        let _ = icp.replace_with_value(obj, "fresh", Value::from(1), None).unwrap();
        assert_eq!(icp.space().send(obj, "fresh", args![]), Ok(Value::from(1)));
        assert_eq!(icp.restore_all(), 1);
        let err = icp.space().send(obj, "fresh", args![]).unwrap_err();
        assert!(err.to_string().contains("undefined method `fresh'"));
    }

    #[test]
    fn forced_visibility_applies() {
        let (icp, obj) = setup();
        let _ = icp.replace(obj, "a", Some(Visibility::Private)).unwrap();
        assert!(icp.space().send(obj, "a", args![]).is_err());
        let _ = icp.replace(obj, "a", Some(Visibility::Public)).unwrap();
        assert!(icp.space().send(obj, "a", args![]).is_ok());
        icp.restore_all();
        assert_eq!(icp.space().visibility_of(obj, "a"), Some(Visibility::Public));
    }

    #[test]
    fn method_missing_proxy_records_two_entries() {
        let space = ObjectSpace::new();
        let class = ClassDef::new("Dynamic")
            .private(METHOD_MISSING, |call| Ok(call.arg(1)))
            .shared();
        let obj = space.spawn(&class);
        let icp = Interceptor::new(space.clone());
        icp.passthrough(obj, METHOD_MISSING).unwrap();

        assert_eq!(space.send(obj, "anything", args![7]), Ok(Value::from(7)));
        let entries = icp.journal().query(obj);
        let names: Vec<_> = entries.iter().map(|e| e.method.as_str()).collect();
        assert_eq!(names, [METHOD_MISSING, "anything"]);
        assert_eq!(entries[1].arguments, args![7]);
        assert_eq!(entries[1].returned(), Some(&Value::from(7)));
    }

    #[test]
    fn intercept_dispatches_by_mode() {
        let (icp, obj) = setup();
        assert!(icp.intercept(obj, "a", Mode::Passthrough, None).unwrap().is_none());
        let behavior: Behavior =
            Arc::new(|_: &mut Call<'_>| -> CallResult { Ok(Value::sym("replaced")) });
        let stub = icp.intercept(obj, "a", Mode::Replace, Some(behavior)).unwrap();
        assert!(stub.is_some());
        assert_eq!(icp.space().send(obj, "a", args![]), Ok(Value::sym("replaced")));
        assert_eq!(icp.reset(), 1);
        assert!(icp.journal().is_empty());
    }
}
