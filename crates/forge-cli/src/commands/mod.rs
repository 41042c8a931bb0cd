//! CLI command implementations.

pub mod common;
pub mod exact;
pub mod reduce;
pub mod solve;
