//! kunth library crate
//!
//! Assesses a source file against coding standards with a language model,
//! applies the chosen suggestion, and pushes the result to a branch.

pub mod config;
pub mod git_ops;
pub mod publish;
pub mod report;
pub mod standards;
pub mod suggest;
pub mod telemetry;
pub mod util;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
