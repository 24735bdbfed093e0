//! Run-log facade: typed lifecycle events mapped onto JSONL entries.
//!
//! Tests run one after another on the caller's thread, so events are written
//! synchronously through a shared writer. Handles are cheap to clone.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::LogConfig;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Events emitted by the test execution engine.
#[derive(Debug, Clone)]
pub enum RunEvent {
    SuiteStarted {
        suite: String,
        tests: usize,
        config_hash: String,
    },
    TestStarted {
        suite: String,
        test: String,
    },
    TestFinished {
        suite: String,
        test: String,
        outcome: String,
        failures: usize,
        restored: usize,
        duration_ms: u64,
        error_code: Option<String>,
    },
    ExpectationFailed {
        suite: String,
        test: String,
        message: String,
        site: Option<String>,
    },
    SuiteFinished {
        suite: String,
        tests: usize,
        failed: usize,
        duration_ms: u64,
    },
}

/// Cloneable handle over the run's JSONL writer.
#[derive(Debug, Clone)]
pub struct RunLog {
    writer: Arc<Mutex<JsonlWriter>>,
}

impl RunLog {
    /// Open the writer described by the `[log]` config section.
    #[must_use]
    pub fn open(config: &LogConfig) -> Self {
        Self::from_writer(JsonlWriter::open(JsonlConfig {
            path: config.path.clone(),
            stderr_fallback: config.stderr_fallback,
        }))
    }

    /// A log that drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::from_writer(JsonlWriter::open(JsonlConfig::default()))
    }

    fn from_writer(writer: JsonlWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn send(&self, event: &RunEvent) {
        let entry = event_to_log_entry(event);
        let mut writer = self.writer.lock();
        writer.write_entry(&entry);
        if matches!(event, RunEvent::SuiteFinished { .. }) {
            writer.flush();
        }
    }

    pub fn flush(&self) {
        self.writer.lock().flush();
    }

    /// Degradation state of the underlying writer.
    #[must_use]
    pub fn state(&self) -> String {
        self.writer.lock().state().to_string()
    }
}

fn event_to_log_entry(event: &RunEvent) -> LogEntry {
    match event {
        RunEvent::SuiteStarted {
            suite,
            tests,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::SuiteStart, Severity::Info);
            e.suite = Some(suite.clone());
            e.tests = Some(*tests);
            e.config_hash = Some(config_hash.clone());
            e
        }
        RunEvent::TestStarted { suite, test } => {
            let mut e = LogEntry::new(EventType::TestStart, Severity::Info);
            e.suite = Some(suite.clone());
            e.test = Some(test.clone());
            e
        }
        RunEvent::TestFinished {
            suite,
            test,
            outcome,
            failures,
            restored,
            duration_ms,
            error_code,
        } => {
            let severity = match (*failures, error_code) {
                (_, Some(_)) => Severity::Error,
                (0, None) => Severity::Info,
                _ => Severity::Warning,
            };
            let mut e = LogEntry::new(EventType::TestFinish, severity);
            e.suite = Some(suite.clone());
            e.test = Some(test.clone());
            e.outcome = Some(outcome.clone());
            e.failures = Some(*failures);
            e.restored = Some(*restored);
            e.duration_ms = Some(*duration_ms);
            e.error_code.clone_from(error_code);
            e
        }
        RunEvent::ExpectationFailed {
            suite,
            test,
            message,
            site,
        } => {
            let mut e = LogEntry::new(EventType::ExpectationFailed, Severity::Warning);
            e.suite = Some(suite.clone());
            e.test = Some(test.clone());
            e.message = Some(message.clone());
            e.site.clone_from(site);
            e
        }
        RunEvent::SuiteFinished {
            suite,
            tests,
            failed,
            duration_ms,
        } => {
            let severity = if *failed == 0 {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::SuiteFinish, severity);
            e.suite = Some(suite.clone());
            e.tests = Some(*tests);
            e.failures = Some(*failed);
            e.duration_ms = Some(*duration_ms);
            e
        }
    }
}
