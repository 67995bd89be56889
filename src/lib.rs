//! Conformance runner
//!
//! Loads a hierarchical corpus of script-engine conformance tests, runs
//! each test in its strict and non-strict variants on a pool of workers,
//! and rolls the outcomes up the suite tree.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod exclusions;
pub mod executor;
pub mod harness;
pub mod metadata;
pub mod models;
pub mod output;
pub mod results;
pub mod utils;
