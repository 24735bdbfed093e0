//! Dispatch layer: dynamic values, objects and their member tables.

pub mod space;
pub mod value;
