//! JSONL run log: one self-contained JSON object per lifecycle event.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line.
//!
//! Three-level fallback chain:
//! 1. Configured file path
//! 2. stderr with `[SPY-JSONL]` prefix (when allowed)
//! 3. Silent discard (a test run must never fail because of logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SpyError};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Lifecycle events of a suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SuiteStart,
    TestStart,
    TestFinish,
    ExpectationFailed,
    SuiteFinish,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Suite name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    /// Test label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// `passed`, `failed` or `skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<usize>,
    /// Members put back by restoration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Number of tests (suite events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<usize>,
    /// Config fingerprint (suite start).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// SPY error code when a test aborted with an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Failure or error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Innermost call site of a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            suite: None,
            test: None,
            outcome: None,
            failures: None,
            restored: None,
            duration_ms: None,
            tests: None,
            config_hash: None,
            error_code: None,
            message: None,
            site: None,
        }
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone, Default)]
pub struct JsonlConfig {
    /// Log file. `None` skips straight to the fallback.
    pub path: Option<PathBuf>,
    /// Whether stderr may be used when the file is unavailable.
    pub stderr_fallback: bool,
}

/// Append-only JSONL writer with fallback.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open the log. Falls through the degradation chain on failure.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Write a single entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SPY-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    #[must_use]
    pub const fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Lines accepted by the file or stderr.
    #[must_use]
    pub const fn lines_written(&self) -> u64 {
        self.lines_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line);
                        return;
                    }
                    self.lines_written += 1;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[SPY-JSONL] {line}").is_ok() {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        let Some(path) = self.config.path.clone() else {
            self.fall_back(None);
            return;
        };
        match open_append(&path) {
            Ok(file) => {
                self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                self.state = WriterState::Normal;
            }
            Err(e) => self.fall_back(Some(&e)),
        }
    }

    fn fall_back(&mut self, cause: Option<&SpyError>) {
        if self.config.stderr_fallback {
            if let Some(cause) = cause {
                let _ = writeln!(io::stderr(), "[SPY-JSONL] {cause}, using stderr");
            }
            self.state = WriterState::Stderr;
        } else {
            self.state = WriterState::Discard;
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => {
                if self.config.stderr_fallback {
                    let _ = writeln!(io::stderr(), "[SPY-JSONL] file write failed, using stderr");
                    self.state = WriterState::Stderr;
                } else {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Stderr | WriterState::Discard => {
                self.state = WriterState::Discard;
            }
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending, creating parent directories.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SpyError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SpyError::io(path, source))
}

/// Current UTC time as RFC 3339 with millisecond precision.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
