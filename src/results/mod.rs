//! Results storage module
//!
//! Provides persistent storage for run reports.

mod storage;

pub use storage::{ExportFormat, ResultsStorage, RunInfo, RunReport, RunTotals};
