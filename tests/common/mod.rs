#![allow(dead_code)]

use spyglass::prelude::*;

/// Members every fixture object carries, one per access level.
pub const LEVELS: [(&str, Visibility); 3] = [
    ("open", Visibility::Public),
    ("guarded", Visibility::Protected),
    ("hidden", Visibility::Private),
];

/// Class with a member at each access level plus a few behaviors used by the
/// interception scenarios.
pub fn account_class() -> std::sync::Arc<ClassDef> {
    ClassDef::new("Account")
        .public("open", |_| Ok(Value::from("open")))
        .protected("guarded", |_| Ok(Value::from("guarded")))
        .private("hidden", |_| Ok(Value::from("hidden")))
        .public("deposit", |call| Ok(call.arg(0)))
        .public("validate", |call| {
            Err(Signal::raise("ArgumentError", format!("x{}", call.args().len())))
        })
        .public("abort", |_| Err(Signal::throw_with("halt", 7)))
        .public("each", |call| {
            call.yield_values(&args![1])?;
            call.yield_values(&args![2])
        })
        .shared()
}

pub fn account(space: &ObjectSpace) -> ObjectId {
    space.spawn_named(&account_class(), "account")
}

/// Observable shape of one member: resolvability, level and override presence.
#[derive(Debug, PartialEq, Eq)]
pub struct MemberShape {
    pub responds: bool,
    pub visibility: Option<Visibility>,
    pub overridden: bool,
}

pub fn shape(space: &ObjectSpace, target: ObjectId, method: &str) -> MemberShape {
    MemberShape {
        responds: space.responds_to(target, method),
        visibility: space.visibility_of(target, method),
        overridden: space.override_of(target, method).is_some(),
    }
}

/// Call ignoring access levels and keep only the value.
pub fn peek(space: &ObjectSpace, target: ObjectId, method: &str) -> Option<Value> {
    space.send_private(target, method, args![]).ok()
}
