//! Shared types and utilities for Vantage
//!
//! This crate contains the data structures exchanged between the coordinator
//! service and the operator CLI: node identities, profiling job identifiers,
//! and the job status model.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{job::*, node::*};
