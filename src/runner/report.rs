//! Per-test and per-suite results handed to the reporting collaborator.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::errors::Result;
use crate::core::failure::Failure;

/// How a test ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed { failures: Vec<Failure> },
    Skipped { origin: String },
}

impl TestOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }

    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Failures of a failed test; empty otherwise.
    #[must_use]
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::Failed { failures } => failures,
            _ => &[],
        }
    }
}

/// Result of one test.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub label: String,
    #[serde(flatten)]
    pub outcome: TestOutcome,
    /// Members put back by restoration.
    pub restored: usize,
    pub duration_ms: u64,
}

/// Result of a suite run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub tests: Vec<TestReport>,
    /// Failures raised by `before_all` / `after_all`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suite_failures: Vec<Failure>,
    /// Tests left out by the `only` filter.
    pub filtered: usize,
    /// Whether fail-fast stopped the run before every test ran.
    pub stopped_early: bool,
    pub duration_ms: u64,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_passed()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_failed()).count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_skipped()).count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.suite_failures.is_empty()
    }

    #[must_use]
    pub fn test(&self, label: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.label == label)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(label: &str, outcome: TestOutcome) -> TestReport {
        TestReport {
            label: label.to_string(),
            outcome,
            restored: 0,
            duration_ms: 1,
        }
    }

    #[test]
    fn counts_by_outcome() {
        let suite = SuiteReport {
            suite: "s".to_string(),
            tests: vec![
                report("a", TestOutcome::Passed),
                report(
                    "b",
                    TestOutcome::Failed {
                        failures: vec![Failure::new("boom")],
                    },
                ),
                report(
                    "c",
                    TestOutcome::Skipped {
                        origin: "x.rs:1:1".to_string(),
                    },
                ),
            ],
            ..SuiteReport::default()
        };
        assert_eq!((suite.passed(), suite.failed(), suite.skipped()), (1, 1, 1));
        assert!(!suite.is_success());
        assert_eq!(suite.test("b").unwrap().outcome.failures().len(), 1);
    }

    #[test]
    fn json_flattens_outcome() {
        let suite = SuiteReport {
            suite: "s".to_string(),
            tests: vec![report("a", TestOutcome::Passed)],
            ..SuiteReport::default()
        };
        let json: serde_json::Value = serde_json::from_str(&suite.to_json().unwrap()).unwrap();
        assert_eq!(json["tests"][0]["outcome"], "passed");
        assert_eq!(json["tests"][0]["label"], "a");
        assert!(json.get("suite_failures").is_none());
    }
}
