//! Behavior resolution for replaced members.
//!
//! A [`Stub`] owns the binding table of one `(target, method)` pair: exact
//! argument-list bindings plus one catch-all. A call resolves to the exact
//! binding for its arguments, else the catch-all, else a no-op returning nil.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{Result, SpyError};
use crate::object::space::{Call, ObjectId};
use crate::object::value::{CallResult, Value};

/// User behavior for a replaced member. The [`Call`] exposes the arguments,
/// the caller's block and the replaced original.
pub type Behavior = Arc<dyn Fn(&mut Call<'_>) -> CallResult + Send + Sync>;

/// What a binding produces.
#[derive(Clone)]
pub enum Response {
    Value(Value),
    Run(Behavior),
}

impl Response {
    fn run(&self, call: &mut Call<'_>) -> CallResult {
        match self {
            Self::Value(value) => Ok(value.clone()),
            Self::Run(behavior) => behavior(call),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// Argument bindings plus one catch-all.
#[derive(Debug, Default, Clone)]
pub struct BehaviorTable {
    bindings: Vec<(Vec<Value>, Response)>,
    catch_all: Option<Response>,
}

impl BehaviorTable {
    /// Bind `args` to `response`, replacing an earlier binding for the same
    /// argument list.
    pub fn bind(&mut self, args: Vec<Value>, response: Response) {
        match self.bindings.iter_mut().find(|(bound, _)| *bound == args) {
            Some(slot) => slot.1 = response,
            None => self.bindings.push((args, response)),
        }
    }

    pub fn set_catch_all(&mut self, response: Response) {
        self.catch_all = Some(response);
    }

    /// Exact match first, then the catch-all.
    #[must_use]
    pub fn resolve(&self, args: &[Value]) -> Option<Response> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound.as_slice() == args)
            .map(|(_, response)| response.clone())
            .or_else(|| self.catch_all.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len() + usize::from(self.catch_all.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ──────────────────── stub handles ────────────────────

/// Handle to the behavior of one stubbed member. Cloning shares the table.
#[derive(Clone)]
pub struct Stub {
    target: ObjectId,
    method: String,
    table: Arc<Mutex<BehaviorTable>>,
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("bindings", &self.table.lock().len())
            .finish()
    }
}

impl Stub {
    pub(crate) fn new(target: ObjectId, method: &str) -> Self {
        Self {
            target,
            method: method.to_string(),
            table: Arc::new(Mutex::new(BehaviorTable::default())),
        }
    }

    #[must_use]
    pub const fn target(&self) -> ObjectId {
        self.target
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Run `behavior` when called with exactly `args`.
    #[must_use]
    pub fn with<F>(&self, args: Vec<Value>, behavior: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.table.lock().bind(args, Response::Run(Arc::new(behavior)));
        self.clone()
    }

    /// Return `value` when called with exactly `args`.
    #[must_use]
    pub fn with_value(&self, args: Vec<Value>, value: impl Into<Value>) -> Self {
        self.table.lock().bind(args, Response::Value(value.into()));
        self.clone()
    }

    /// Run `behavior` when no exact binding matches.
    #[must_use]
    pub fn with_any<F>(&self, behavior: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.table.lock().set_catch_all(Response::Run(Arc::new(behavior)));
        self.clone()
    }

    /// Return `value` when no exact binding matches.
    #[must_use]
    pub fn with_any_value(&self, value: impl Into<Value>) -> Self {
        self.table
            .lock()
            .set_catch_all(Response::Value(value.into()));
        self.clone()
    }

    /// Set the catch-all from exactly one of a literal or a behavior.
    pub fn try_with_any(&self, value: Option<Value>, behavior: Option<Behavior>) -> Result<Self> {
        let response = match (value, behavior) {
            (Some(value), None) => Response::Value(value),
            (None, Some(behavior)) => Response::Run(behavior),
            (Some(_), Some(_)) => {
                return Err(SpyError::usage(
                    "with_any",
                    "both a value and a behavior given; use either one",
                ));
            }
            (None, None) => {
                return Err(SpyError::usage(
                    "with_any",
                    "neither a value nor a behavior given",
                ));
            }
        };
        self.table.lock().set_catch_all(response);
        Ok(self.clone())
    }

    /// Resolve and run the behavior for this call.
    pub(crate) fn respond(&self, call: &mut Call<'_>) -> CallResult {
        let response = self.table.lock().resolve(call.args());
        match response {
            Some(response) => response.run(call),
            None => Ok(Value::Nil),
        }
    }
}

/// Several stubs on one target sharing each declaration.
#[derive(Debug, Clone)]
pub struct StubGroup {
    stubs: Vec<Stub>,
}

impl StubGroup {
    pub(crate) fn new(stubs: Vec<Stub>) -> Self {
        Self { stubs }
    }

    #[must_use]
    pub fn stubs(&self) -> &[Stub] {
        &self.stubs
    }

    #[must_use]
    pub fn with<F>(&self, args: Vec<Value>, behavior: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        let behavior: Behavior = Arc::new(behavior);
        for stub in &self.stubs {
            stub.table
                .lock()
                .bind(args.clone(), Response::Run(Arc::clone(&behavior)));
        }
        self.clone()
    }

    #[must_use]
    pub fn with_value(&self, args: Vec<Value>, value: impl Into<Value>) -> Self {
        let value = value.into();
        for stub in &self.stubs {
            let _ = stub.with_value(args.clone(), value.clone());
        }
        self.clone()
    }

    #[must_use]
    pub fn with_any<F>(&self, behavior: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        let behavior: Behavior = Arc::new(behavior);
        for stub in &self.stubs {
            stub.table
                .lock()
                .set_catch_all(Response::Run(Arc::clone(&behavior)));
        }
        self.clone()
    }

    #[must_use]
    pub fn with_any_value(&self, value: impl Into<Value>) -> Self {
        let value = value.into();
        for stub in &self.stubs {
            let _ = stub.with_any_value(value.clone());
        }
        self.clone()
    }
}

/// Returned by mapping declarations. Each member already has its value, so
/// adding bindings would be ambiguous and is refused.
#[derive(Debug, Clone)]
pub struct MappedStub {
    stubs: Vec<Stub>,
}

impl MappedStub {
    pub(crate) fn new(stubs: Vec<Stub>) -> Self {
        Self { stubs }
    }

    #[must_use]
    pub fn stubs(&self) -> &[Stub] {
        &self.stubs
    }

    pub fn with(&self, _args: Vec<Value>) -> Result<Stub> {
        Err(Self::ambiguous("with"))
    }

    pub fn with_any(&self) -> Result<Stub> {
        Err(Self::ambiguous("with_any"))
    }

    fn ambiguous(operation: &'static str) -> SpyError {
        SpyError::usage(
            operation,
            "constraints can not be added to members declared through a mapping",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::object::space::ObjectSpace;

    fn stub() -> (ObjectSpace, ObjectId, Stub) {
        let space = ObjectSpace::new();
        let target = space.spawn_empty(None);
        (space.clone(), target, Stub::new(target, "a"))
    }

    fn respond(space: &ObjectSpace, target: ObjectId, stub: &Stub, args: Vec<Value>) -> CallResult {
        let mut call = Call::new(space, target, "a", args, None);
        stub.respond(&mut call)
    }

    #[test]
    fn empty_table_returns_nil() {
        let (space, target, stub) = stub();
        assert_eq!(respond(&space, target, &stub, args![1]), Ok(Value::Nil));
    }

    #[test]
    fn exact_binding_wins_over_catch_all() {
        let (space, target, stub) = stub();
        let _ = stub
            .with(args![1], |_| Ok(Value::sym("one")))
            .with_any_value(Value::sym("any"));
        assert_eq!(respond(&space, target, &stub, args![1]), Ok(Value::sym("one")));
        assert_eq!(respond(&space, target, &stub, args![2]), Ok(Value::sym("any")));
        assert_eq!(respond(&space, target, &stub, args![]), Ok(Value::sym("any")));
    }

    #[test]
    fn later_binding_replaces_same_arguments() {
        let (space, target, stub) = stub();
        let _ = stub.with_value(args![1], 1).with_value(args![1], 2);
        assert_eq!(respond(&space, target, &stub, args![1]), Ok(Value::from(2)));
        assert_eq!(stub.table.lock().len(), 1);
    }

    #[test]
    fn behaviors_see_arguments() {
        let (space, target, stub) = stub();
        let _ = stub.with_any(|call| Ok(Value::from(call.args().len() as i64)));
        assert_eq!(respond(&space, target, &stub, args![1, 2, 3]), Ok(Value::from(3)));
    }

    #[test]
    fn try_with_any_rejects_ambiguous_fallbacks() {
        let (_, _, stub) = stub();
        let behavior: Behavior = Arc::new(|_: &mut Call<'_>| -> CallResult { Ok(Value::Nil) });
        let both = stub.try_with_any(Some(Value::Nil), Some(behavior));
        assert!(matches!(both, Err(SpyError::Usage { .. })));
        let neither = stub.try_with_any(None, None);
        assert!(matches!(neither, Err(SpyError::Usage { .. })));
        assert!(stub.try_with_any(Some(Value::from(1)), None).is_ok());
    }

    #[test]
    fn group_fans_out_and_mapping_refuses() {
        let (space, target, a) = stub();
        let b = Stub::new(target, "b");
        let group = StubGroup::new(vec![a.clone(), b.clone()]).with_any_value(7);
        assert_eq!(group.stubs().len(), 2);
        assert_eq!(respond(&space, target, &b, args![]), Ok(Value::from(7)));

        let mapped = MappedStub::new(vec![a]);
        assert!(mapped.with(args![1]).unwrap_err().is_usage());
        assert!(mapped.with_any().unwrap_err().is_usage());
    }
}
