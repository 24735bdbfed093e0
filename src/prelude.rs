//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use spyglass::prelude::*;
//! ```

// Core
pub use crate::core::config::RunConfig;
pub use crate::core::errors::{Result, SpyError};
pub use crate::core::failure::Failure;

// Objects
pub use crate::args;
pub use crate::object::space::{Call, ClassDef, ObjectId, ObjectSpace, Visibility};
pub use crate::object::value::{CallResult, RaisedError, Signal, Thrown, Value};

// Interception
pub use crate::mocks::behavior::{MappedStub, Stub, StubGroup};
pub use crate::mocks::journal::{Invocation, Journal, Outcome};
pub use crate::mocks::session::MockSession;

// Expectations
pub use crate::expect::expectation::{Constrain, Expectation, Status};
pub use crate::expect::matchers::{RaiseMatcher, TextMatcher, ValueMatcher};
pub use crate::expect::verify::Verification;

// Runner
pub use crate::logger::run_log::RunLog;
pub use crate::runner::context::TestContext;
pub use crate::runner::engine::Suite;
pub use crate::runner::flow::{Halt, Step};
pub use crate::runner::hooks::{HookFilter, LabelMatcher};
pub use crate::runner::report::{SuiteReport, TestOutcome, TestReport};
