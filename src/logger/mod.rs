//! Run logging: JSONL lifecycle events with graceful degradation.

pub mod jsonl;
pub mod run_log;
