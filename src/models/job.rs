//! Schedulable units of work

use std::fmt;
use std::sync::Arc;

use super::RunType;
use crate::corpus::Test;

/// One run of one test in one mode
#[derive(Clone, Debug)]
pub struct Job {
    pub test: Arc<Test>,
    pub run_type: RunType,
}

impl Job {
    pub fn new(test: Arc<Test>, run_type: RunType) -> Self {
        Self { test, run_type }
    }

    pub fn path(&self) -> &str {
        self.test.path()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.test.path(), self.run_type)
    }
}
