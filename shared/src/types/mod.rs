//! Core data types

pub mod job;
pub mod node;
