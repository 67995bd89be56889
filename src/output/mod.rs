//! Output formatting module
//!
//! Provides various output formats for results and suite trees.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter, SuiteNode};
