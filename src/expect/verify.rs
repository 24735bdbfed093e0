//! Immediate spy verification.
//!
//! Unlike an [`Expectation`](crate::expect::expectation::Expectation), a
//! verification looks at the journal as it is right now. Each constraint is
//! checked as it is added; once one fails the rest are skipped.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::core::errors::SpyError;
use crate::expect::constraint::{Constraint, Evidence};
use crate::expect::expectation::Constrain;
use crate::mocks::journal::Journal;
use crate::object::space::{ObjectId, ObjectSpace};
use crate::runner::flow::{FailureSink, Halt};

/// Chainable spy check bound to a failure sink.
#[derive(Debug, Clone)]
pub struct Verification {
    evidence: Arc<Evidence>,
    negated: bool,
    failed: bool,
    sink: FailureSink,
}

impl Verification {
    /// Snapshot the journal for `target` and check presence right away.
    pub fn new(
        journal: &Journal,
        space: &ObjectSpace,
        target: ObjectId,
        methods: &[&str],
        negated: bool,
        site: &str,
        sink: FailureSink,
    ) -> Result<Self, Halt> {
        if methods.is_empty() {
            return Err(SpyError::usage("received", "at least one method name required").into());
        }
        let mut unique: Vec<String> = Vec::with_capacity(methods.len());
        for method in methods {
            if !unique.iter().any(|m| m == method) {
                unique.push((*method).to_string());
            }
        }
        let evidence = Evidence::collect(journal, space, target, &unique).at_site(site);
        let mut verification = Self {
            evidence: Arc::new(evidence),
            negated,
            failed: false,
            sink,
        };
        if let Err(failure) = verification.evidence.check_presence(negated) {
            verification.failed = true;
            verification.sink.push(failure)?;
        }
        Ok(verification)
    }

    /// Whether a check of this chain has failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.failed
    }
}

impl Constrain for Verification {
    type Error = Halt;

    fn method_count(&self) -> usize {
        self.evidence.methods.len()
    }

    fn constrain(&self, constraint: Constraint) -> Result<Self, Halt> {
        if self.negated {
            return Err(SpyError::usage(
                "not_received",
                "constraints can not be attached to a negated verification",
            )
            .into());
        }
        if self.failed {
            return Ok(self.clone());
        }
        match constraint.check(&self.evidence) {
            Ok(()) => Ok(self.clone()),
            Err(failure) => {
                let mut next = self.clone();
                next.failed = true;
                next.sink.push(failure)?;
                Ok(next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::object::value::Value;

    fn setup() -> (ObjectSpace, Journal, ObjectId) {
        let space = ObjectSpace::new();
        let target = space.spawn_empty(Some("spied"));
        let journal = Journal::new();
        for (method, n) in [("a", 1), ("b", 2)] {
            let id = journal.record(target, method, args![n], vec![]);
            journal.complete(id, &Ok(Value::from(n)));
        }
        (space, journal, target)
    }

    #[test]
    fn passing_chain_records_nothing() {
        let (space, journal, target) = setup();
        let sink = FailureSink::new(false);
        let verified =
            Verification::new(&journal, &space, target, &["a", "b"], false, "", sink.clone())
                .unwrap()
            .count(&[1, 2])
            .unwrap()
            .with(args![1, 2])
            .unwrap()
            .and_returns(vec![1.into(), 2.into()])
            .unwrap();
        assert!(!verified.failed());
        assert!(sink.is_empty());
    }

    #[test]
    fn failure_stops_in_default_mode() {
        let (space, journal, target) = setup();
        let sink = FailureSink::new(false);
        let halted = Verification::new(&journal, &space, target, &["c"], false, "", sink.clone());
        assert!(matches!(halted, Err(Halt::Stop)));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn continue_mode_skips_after_first_failure() {
        let (space, journal, target) = setup();
        let sink = FailureSink::new(true);
        let verified = Verification::new(&journal, &space, target, &["a"], false, "", sink.clone())
            .unwrap()
            .twice()
            .unwrap()
            .with(args![5])
            .unwrap();
        assert!(verified.failed());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn not_received_passes_for_silent_methods() {
        let (space, journal, target) = setup();
        let sink = FailureSink::new(false);
        let verified =
            Verification::new(&journal, &space, target, &["x", "y"], true, "", sink.clone()).unwrap();
        assert!(!verified.failed());
        assert!(matches!(verified.once(), Err(Halt::Error(SpyError::Usage { .. }))));
    }
}
