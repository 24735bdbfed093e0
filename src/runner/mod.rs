//! Test execution engine: per-test lifecycle, hooks, control flow and reports.

pub mod context;
pub mod engine;
pub mod flow;
pub mod hooks;
pub mod report;
