//! Expectation engine: matchers, constraints, deferred expectations and
//! immediate spy verification.

pub mod constraint;
pub mod expectation;
pub mod matchers;
pub mod verify;
