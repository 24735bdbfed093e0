//! Explicit control flow for test bodies and hooks.
//!
//! Bodies and hooks return [`Step`]. A halt travels back through `?` to the
//! engine, which decides what still runs.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::SpyError;
use crate::core::failure::Failure;

/// Why a body or hook stopped early.
#[derive(Debug)]
pub enum Halt {
    /// `skip` was called; the rest of the body and the after-hooks are
    /// skipped and the test is reported as skipped.
    Skip { origin: String },
    /// A failure was recorded while failures short-circuit.
    Stop,
    /// Declaration misuse or an interception error.
    Error(SpyError),
}

impl Halt {
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}

impl From<SpyError> for Halt {
    fn from(value: SpyError) -> Self {
        Self::Error(value)
    }
}

/// Result of one body or hook step.
pub type Step = std::result::Result<(), Halt>;

/// Per-test failure collector.
///
/// In the default mode every push returns [`Halt::Stop`] so the caller stops
/// at the first failure; with continue-on-failure pushes return `Ok` and the
/// failures accumulate.
#[derive(Debug, Clone)]
pub struct FailureSink {
    failures: Arc<Mutex<Vec<Failure>>>,
    continue_on_failure: bool,
}

impl FailureSink {
    #[must_use]
    pub fn new(continue_on_failure: bool) -> Self {
        Self {
            failures: Arc::new(Mutex::new(Vec::new())),
            continue_on_failure,
        }
    }

    #[must_use]
    pub const fn continue_on_failure(&self) -> bool {
        self.continue_on_failure
    }

    pub fn push(&self, failure: Failure) -> Step {
        self.failures.lock().push(failure);
        if self.continue_on_failure {
            Ok(())
        } else {
            Err(Halt::Stop)
        }
    }

    /// Record without affecting control flow (validation, engine errors).
    pub fn record(&self, failure: Failure) {
        self.failures.lock().push(failure);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn take(&self) -> Vec<Failure> {
        std::mem::take(&mut *self.failures.lock())
    }
}
