//! Core types: errors, configuration, failure records.

pub mod config;
pub mod errors;
pub mod failure;
