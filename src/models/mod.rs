//! Data models for conformance test execution
//!
//! This module contains the value types shared by the corpus, the scheduler
//! and the output layer.

mod job;
mod run_type;
mod test_result;

pub use job::Job;
pub use run_type::RunType;
pub use test_result::{RunTypeCounts, SuiteResults, SuiteState, TestResult, TestState};
