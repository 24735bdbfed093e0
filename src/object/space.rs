//! Object space: identity-keyed objects, member tables and the dispatcher.
//!
//! Every object has an optional shared [`ClassDef`] plus its own override
//! table. Dispatch consults the override table first, then the class. This is
//! where interception installs its wrappers and where restoration puts the
//! original members back (or removes them).
//!
//! Access levels are emulated: a public [`ObjectSpace::send`] refuses
//! protected/private members, [`ObjectSpace::send_private`] bypasses the check.
//! Unresolvable names go to the object's [`METHOD_MISSING`] member when it has
//! one.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SpyError};
use crate::object::value::{CallResult, Signal, Value};

/// Name of the designated resolve-unknown-member operation.
pub const METHOD_MISSING: &str = "method_missing";

/// Opaque object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<object:{}>", self.0)
    }
}

/// Member access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
        })
    }
}

/// Implementation of a member.
pub type Callable = Arc<dyn Fn(&mut Call<'_>) -> CallResult + Send + Sync>;

/// Block passed along with a call; receives the yielded values.
pub type Block = Arc<dyn Fn(&[Value]) -> CallResult + Send + Sync>;

/// A callable installed at an access level.
#[derive(Clone)]
pub struct Member {
    pub callable: Callable,
    pub visibility: Visibility,
}

impl Member {
    #[must_use]
    pub fn new(callable: Callable, visibility: Visibility) -> Self {
        Self {
            callable,
            visibility,
        }
    }

    #[must_use]
    pub fn public<F>(f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        Self::new(Arc::new(f), Visibility::Public)
    }

    /// Same implementation at another access level.
    #[must_use]
    pub fn at(&self, visibility: Visibility) -> Self {
        Self {
            callable: Arc::clone(&self.callable),
            visibility,
        }
    }

    /// Whether two members share the exact same implementation.
    #[must_use]
    pub fn same_callable(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

// ──────────────────── class definitions ────────────────────

/// Shared member table for a family of objects.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    members: HashMap<String, Member>,
}

impl ClassDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    #[must_use]
    pub fn member<F>(mut self, name: &str, visibility: Visibility, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.members
            .insert(name.to_string(), Member::new(Arc::new(f), visibility));
        self
    }

    #[must_use]
    pub fn public<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Visibility::Public, f)
    }

    #[must_use]
    pub fn protected<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Visibility::Protected, f)
    }

    #[must_use]
    pub fn private<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Visibility::Private, f)
    }

    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }
}

// ──────────────────── calls ────────────────────

/// Everything a member implementation sees about the current call.
pub struct Call<'a> {
    space: &'a ObjectSpace,
    receiver: ObjectId,
    method: String,
    args: Vec<Value>,
    block: Option<Block>,
    original: Option<Member>,
}

impl<'a> Call<'a> {
    pub(crate) fn new(
        space: &'a ObjectSpace,
        receiver: ObjectId,
        method: impl Into<String>,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> Self {
        Self {
            space,
            receiver,
            method: method.into(),
            args,
            block,
            original: None,
        }
    }

    /// Same call with a different block and an original member reachable
    /// through [`Call::call_original`].
    pub(crate) fn forward(&self, block: Option<Block>, original: Option<Member>) -> Call<'a> {
        Call {
            space: self.space,
            receiver: self.receiver,
            method: self.method.clone(),
            args: self.args.clone(),
            block,
            original,
        }
    }

    #[must_use]
    pub const fn space(&self) -> &'a ObjectSpace {
        self.space
    }

    #[must_use]
    pub const fn receiver(&self) -> ObjectId {
        self.receiver
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`, `nil` when not given.
    #[must_use]
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Nil)
    }

    #[must_use]
    pub const fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    #[must_use]
    pub const fn has_block(&self) -> bool {
        self.block.is_some()
    }

    /// Invoke the caller's block with `values`.
    pub fn yield_values(&self, values: &[Value]) -> CallResult {
        match &self.block {
            Some(block) => block(values),
            None => Err(Signal::raise("LocalJumpError", "no block given (yield)")),
        }
    }

    /// The member this call replaced, when a stub behavior runs over an
    /// existing member.
    #[must_use]
    pub const fn original(&self) -> Option<&Member> {
        self.original.as_ref()
    }

    /// Run the replaced member with the same arguments and block.
    pub fn call_original(&self) -> CallResult {
        self.call_original_with(self.args.clone())
    }

    /// Run the replaced member with other arguments.
    pub fn call_original_with(&self, args: Vec<Value>) -> CallResult {
        let Some(original) = self.original.clone() else {
            return Err(Signal::no_method(format!(
                "{} has no original `{}' to call",
                self.space.inspect(self.receiver),
                self.method
            )));
        };
        let mut call = Call::new(
            self.space,
            self.receiver,
            self.method.clone(),
            args,
            self.block.clone(),
        );
        (original.callable)(&mut call)
    }
}

// ──────────────────── space ────────────────────

#[derive(Debug)]
struct ObjectEntry {
    class: Option<Arc<ClassDef>>,
    name: Option<String>,
    overrides: HashMap<String, Member>,
    double: bool,
}

impl ObjectEntry {
    fn resolve(&self, method: &str) -> Option<&Member> {
        self.overrides
            .get(method)
            .or_else(|| self.class.as_ref().and_then(|class| class.get(method)))
    }
}

#[derive(Debug, Default)]
struct SpaceInner {
    next_id: u64,
    objects: HashMap<ObjectId, ObjectEntry>,
    frames: Vec<String>,
}

enum Lookup {
    UnknownObject,
    Found(Member),
    Missing(Option<Member>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Any,
}

/// Shared registry of live objects. Cloning yields another handle to the same
/// space.
#[derive(Clone, Default)]
pub struct ObjectSpace {
    inner: Arc<Mutex<SpaceInner>>,
}

impl fmt::Debug for ObjectSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ObjectSpace")
            .field("objects", &inner.objects.len())
            .field("depth", &inner.frames.len())
            .finish()
    }
}

impl ObjectSpace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, entry: ObjectEntry) -> ObjectId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ObjectId(inner.next_id);
        inner.objects.insert(id, entry);
        id
    }

    /// New instance of `class`.
    pub fn spawn(&self, class: &Arc<ClassDef>) -> ObjectId {
        self.insert(ObjectEntry {
            class: Some(Arc::clone(class)),
            name: None,
            overrides: HashMap::new(),
            double: false,
        })
    }

    /// New instance of `class` reported under `name`.
    pub fn spawn_named(&self, class: &Arc<ClassDef>, name: &str) -> ObjectId {
        self.insert(ObjectEntry {
            class: Some(Arc::clone(class)),
            name: Some(name.to_string()),
            overrides: HashMap::new(),
            double: false,
        })
    }

    /// Plain object without members.
    pub fn spawn_empty(&self, name: Option<&str>) -> ObjectId {
        self.insert(ObjectEntry {
            class: None,
            name: name.map(ToString::to_string),
            overrides: HashMap::new(),
            double: false,
        })
    }

    /// Synthetic object that only carries stubbed behavior.
    pub fn spawn_double(&self, name: Option<&str>) -> ObjectId {
        self.insert(ObjectEntry {
            class: None,
            name: name.map(ToString::to_string),
            overrides: HashMap::new(),
            double: true,
        })
    }

    /// Forget an object. Later dispatch to it raises.
    pub fn release(&self, id: ObjectId) -> bool {
        self.inner.lock().objects.remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.lock().objects.contains_key(&id)
    }

    #[must_use]
    pub fn is_double(&self, id: ObjectId) -> bool {
        self.inner
            .lock()
            .objects
            .get(&id)
            .is_some_and(|entry| entry.double)
    }

    /// Inspect string used in failure messages.
    #[must_use]
    pub fn inspect(&self, id: ObjectId) -> String {
        let inner = self.inner.lock();
        match inner.objects.get(&id) {
            Some(ObjectEntry {
                name: Some(name), ..
            }) => name.clone(),
            Some(ObjectEntry {
                class: Some(class), ..
            }) => format!("#<{}:{}>", class.name(), id.0),
            Some(entry) if entry.double => format!("#<double:{}>", id.0),
            _ => id.to_string(),
        }
    }

    /// Member currently resolving for `method` (override first, then class).
    #[must_use]
    pub fn resolve(&self, id: ObjectId, method: &str) -> Option<Member> {
        self.inner
            .lock()
            .objects
            .get(&id)
            .and_then(|entry| entry.resolve(method).cloned())
    }

    #[must_use]
    pub fn visibility_of(&self, id: ObjectId, method: &str) -> Option<Visibility> {
        self.resolve(id, method).map(|member| member.visibility)
    }

    /// Whether a public call to `method` would resolve directly.
    #[must_use]
    pub fn responds_to(&self, id: ObjectId, method: &str) -> bool {
        self.visibility_of(id, method) == Some(Visibility::Public)
    }

    /// Per-object override for `method`, if any.
    #[must_use]
    pub fn override_of(&self, id: ObjectId, method: &str) -> Option<Member> {
        self.inner
            .lock()
            .objects
            .get(&id)
            .and_then(|entry| entry.overrides.get(method).cloned())
    }

    /// Install a per-object member, replacing any previous override.
    pub fn define_override(&self, id: ObjectId, method: &str, member: Member) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .objects
            .get_mut(&id)
            .ok_or(SpyError::UnknownObject { id: id.0 })?;
        entry.overrides.insert(method.to_string(), member);
        Ok(())
    }

    /// Drop a per-object member. Returns the removed one.
    pub fn remove_override(&self, id: ObjectId, method: &str) -> Option<Member> {
        self.inner
            .lock()
            .objects
            .get_mut(&id)
            .and_then(|entry| entry.overrides.remove(method))
    }

    /// Change the access level of an existing override.
    pub fn set_override_visibility(
        &self,
        id: ObjectId,
        method: &str,
        visibility: Visibility,
    ) -> bool {
        let mut inner = self.inner.lock();
        match inner
            .objects
            .get_mut(&id)
            .and_then(|entry| entry.overrides.get_mut(method))
        {
            Some(member) => {
                member.visibility = visibility;
                true
            }
            None => false,
        }
    }

    /// Call-site chain of the calls currently in flight, innermost first.
    #[must_use]
    pub fn call_frames(&self) -> Vec<String> {
        self.inner.lock().frames.iter().rev().cloned().collect()
    }

    /// Public call.
    #[track_caller]
    pub fn send(&self, target: ObjectId, method: &str, args: Vec<Value>) -> CallResult {
        self.dispatch(target, method, args, None, Access::Public, Location::caller())
    }

    /// Public call with a block.
    #[track_caller]
    pub fn send_with_block<F>(
        &self,
        target: ObjectId,
        method: &str,
        args: Vec<Value>,
        block: F,
    ) -> CallResult
    where
        F: Fn(&[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.dispatch(
            target,
            method,
            args,
            Some(Arc::new(block)),
            Access::Public,
            Location::caller(),
        )
    }

    /// Call ignoring access levels, as from inside the object.
    #[track_caller]
    pub fn send_private(&self, target: ObjectId, method: &str, args: Vec<Value>) -> CallResult {
        self.dispatch(target, method, args, None, Access::Any, Location::caller())
    }

    fn lookup(&self, target: ObjectId, method: &str) -> Lookup {
        let inner = self.inner.lock();
        let Some(entry) = inner.objects.get(&target) else {
            return Lookup::UnknownObject;
        };
        match entry.resolve(method) {
            Some(member) => Lookup::Found(member.clone()),
            None => Lookup::Missing(entry.resolve(METHOD_MISSING).cloned()),
        }
    }

    fn dispatch(
        &self,
        target: ObjectId,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
        access: Access,
        site: &Location<'_>,
    ) -> CallResult {
        let frame = format!("{}:{}:{}", site.file(), site.line(), site.column());
        match self.lookup(target, method) {
            Lookup::UnknownObject => Err(Signal::no_method(format!(
                "undefined method `{method}' for released object {target}"
            ))),
            Lookup::Found(member) => {
                if access == Access::Public && member.visibility != Visibility::Public {
                    return Err(Signal::no_method(format!(
                        "{} method `{method}' called for {}",
                        member.visibility,
                        self.inspect(target)
                    )));
                }
                self.invoke(&member, Call::new(self, target, method, args, block), frame)
            }
            Lookup::Missing(Some(fallback)) => {
                let mut forwarded = Vec::with_capacity(args.len() + 1);
                forwarded.push(Value::sym(method));
                forwarded.extend(args);
                self.invoke(
                    &fallback,
                    Call::new(self, target, METHOD_MISSING, forwarded, block),
                    frame,
                )
            }
            Lookup::Missing(None) => Err(Signal::no_method(format!(
                "undefined method `{method}' for {}",
                self.inspect(target)
            ))),
        }
    }

    fn invoke(&self, member: &Member, mut call: Call<'_>, frame: String) -> CallResult {
        self.inner.lock().frames.push(frame);
        let _frame = FrameGuard { space: self };
        (member.callable)(&mut call)
    }
}

/// Pops the dispatch frame even when the member panics.
struct FrameGuard<'a> {
    space: &'a ObjectSpace,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.space.inner.lock().frames.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn account() -> Arc<ClassDef> {
        ClassDef::new("Account")
            .public("balance", |_| Ok(Value::from(100)))
            .protected("ledger", |_| Ok(Value::sym("ledger")))
            .private("secret", |_| Ok(Value::sym("secret")))
            .public("audit", |call| {
                call.space().send_private(call.receiver(), "secret", args![])
            })
            .shared()
    }

    #[test]
    fn public_send_resolves_class_members() {
        let space = ObjectSpace::new();
        let obj = space.spawn(&account());
        assert_eq!(space.send(obj, "balance", args![]), Ok(Value::from(100)));
        assert!(space.responds_to(obj, "balance"));
    }

    #[test]
    fn public_send_refuses_hidden_members() {
        let space = ObjectSpace::new();
        let obj = space.spawn(&account());
        let err = space.send(obj, "secret", args![]).unwrap_err();
        assert!(err.to_string().contains("private method `secret'"));
        let err = space.send(obj, "ledger", args![]).unwrap_err();
        assert!(err.to_string().contains("protected method `ledger'"));
        assert_eq!(space.visibility_of(obj, "secret"), Some(Visibility::Private));
    }

    #[test]
    fn private_send_and_self_calls_bypass_access() {
        let space = ObjectSpace::new();
        let obj = space.spawn(&account());
        assert_eq!(space.send(obj, "audit", args![]), Ok(Value::sym("secret")));
        assert_eq!(
            space.send_private(obj, "ledger", args![]),
            Ok(Value::sym("ledger"))
        );
    }

    #[test]
    fn missing_members_raise_no_method() {
        let space = ObjectSpace::new();
        let obj = space.spawn(&account());
        let err = space.send(obj, "withdraw", args![]).unwrap_err();
        let raised = err.raised().unwrap();
        assert_eq!(raised.kind, "NoMethodError");
        assert!(raised.message.contains("undefined method `withdraw'"));
    }

    #[test]
    fn method_missing_receives_requested_name() {
        let space = ObjectSpace::new();
        let class = ClassDef::new("Ghost")
            .private(METHOD_MISSING, |call| Ok(call.arg(0)))
            .shared();
        let obj = space.spawn(&class);
        assert_eq!(space.send(obj, "boo", args![1]), Ok(Value::sym("boo")));
    }

    #[test]
    fn overrides_shadow_class_members_per_object() {
        let space = ObjectSpace::new();
        let class = account();
        let a = space.spawn(&class);
        let b = space.spawn(&class);
        space
            .define_override(a, "balance", Member::public(|_| Ok(Value::from(0))))
            .unwrap();
        assert_eq!(space.send(a, "balance", args![]), Ok(Value::from(0)));
        assert_eq!(space.send(b, "balance", args![]), Ok(Value::from(100)));
        assert!(space.remove_override(a, "balance").is_some());
        assert_eq!(space.send(a, "balance", args![]), Ok(Value::from(100)));
    }

    #[test]
    fn blocks_receive_yielded_values() {
        let space = ObjectSpace::new();
        let class = ClassDef::new("Each")
            .public("each", |call| call.yield_values(&args![1, 2]))
            .shared();
        let obj = space.spawn(&class);
        let got = space.send_with_block(obj, "each", args![], |values| {
            Ok(Value::List(values.to_vec()))
        });
        assert_eq!(got, Ok(Value::from(vec![1, 2])));
        let err = space.send(obj, "each", args![]).unwrap_err();
        assert_eq!(err.raised().unwrap().kind, "LocalJumpError");
    }

    #[test]
    fn call_frames_track_nested_dispatch() {
        let space = ObjectSpace::new();
        let class = ClassDef::new("Nested")
            .public("outer", |call| {
                call.space().send(call.receiver(), "inner", args![])
            })
            .public("inner", |call| {
                Ok(Value::from(call.space().call_frames().len() as i64))
            })
            .shared();
        let obj = space.spawn(&class);
        assert_eq!(space.send(obj, "outer", args![]), Ok(Value::from(2)));
        assert!(space.call_frames().is_empty());
    }

    #[test]
    fn released_objects_are_unknown() {
        let space = ObjectSpace::new();
        let obj = space.spawn_double(Some("user"));
        assert_eq!(space.inspect(obj), "user");
        assert!(space.is_double(obj));
        assert!(space.release(obj));
        assert!(!space.contains(obj));
        assert!(space.send(obj, "name", args![]).is_err());
        assert!(matches!(
            space.define_override(obj, "name", Member::public(|_| Ok(Value::Nil))),
            Err(SpyError::UnknownObject { .. })
        ));
    }
}
