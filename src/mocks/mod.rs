//! Interception layer: the call journal, stub behaviors, restoration and the
//! per-test mocking session.

pub mod behavior;
pub mod interceptor;
pub mod journal;
pub mod restore;
pub mod session;
