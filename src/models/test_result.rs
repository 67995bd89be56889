//! Test result models
//!
//! Defines run outcomes and the state values derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{Job, RunType};

/// Outcome of executing one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Normalized path of the test that was run
    pub path: String,
    pub run_type: RunType,
    pub success: bool,
    pub stderr: String,
    pub stdout: String,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn new(job: &Job, success: bool, stderr: String, stdout: String, elapsed: Duration) -> Self {
        Self {
            path: job.path().to_string(),
            run_type: job.run_type,
            success,
            stderr,
            stdout,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn symbol(&self) -> &'static str {
        if self.success {
            "✓"
        } else {
            "✗"
        }
    }

    /// File name component of the test path
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (type: {}) finished in {}ms, success: {}",
            self.symbol(),
            self.path,
            self.run_type,
            self.duration_ms,
            self.success
        )
    }
}

/// State of a single test for one run type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestState {
    WillNotRun,
    HasNotRun,
    Success,
    Failure,
}

impl TestState {
    pub fn name(&self) -> &'static str {
        match self {
            TestState::WillNotRun => "will-not-run",
            TestState::HasNotRun => "has-not-run",
            TestState::Success => "success",
            TestState::Failure => "failure",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TestState::WillNotRun => "-",
            TestState::HasNotRun => "○",
            TestState::Success => "✓",
            TestState::Failure => "✗",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rolled-up state of a suite for one run type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteState {
    WillNotRun,
    HasNotRun,
    PartialSuccess,
    Success,
    Failure,
}

impl SuiteState {
    pub fn name(&self) -> &'static str {
        match self {
            SuiteState::WillNotRun => "will-not-run",
            SuiteState::HasNotRun => "has-not-run",
            SuiteState::PartialSuccess => "partial-success",
            SuiteState::Success => "success",
            SuiteState::Failure => "failure",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            SuiteState::WillNotRun => "-",
            SuiteState::HasNotRun => "○",
            SuiteState::PartialSuccess => "~",
            SuiteState::Success => "✓",
            SuiteState::Failure => "✗",
        }
    }
}

impl fmt::Display for SuiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per run type tallies for the tests directly owned by a suite
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTypeCounts {
    /// Tests that apply and are not excluded
    pub total: u32,
    /// Subset of `total` whose last result succeeded
    pub success: u32,
    pub excluded: u32,
}

impl RunTypeCounts {
    /// Count one test in the given state
    pub fn record(&mut self, state: TestState) {
        match state {
            TestState::WillNotRun => self.excluded += 1,
            TestState::Success => {
                self.total += 1;
                self.success += 1;
            }
            TestState::HasNotRun | TestState::Failure => self.total += 1,
        }
    }

    /// Rolled-up state for these counts
    pub fn state(&self) -> SuiteState {
        if self.total == 0 {
            return if self.excluded > 0 {
                SuiteState::WillNotRun
            } else {
                SuiteState::HasNotRun
            };
        }

        // success >= total / 2, kept in integers so exactly half is partial
        if self.success == self.total {
            SuiteState::Success
        } else if self.success * 2 >= self.total {
            SuiteState::PartialSuccess
        } else {
            SuiteState::Failure
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }
}

/// Both run types' tallies for one suite
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteResults {
    pub strict: RunTypeCounts,
    pub nonstrict: RunTypeCounts,
}

impl SuiteResults {
    pub fn get(&self, run_type: RunType) -> &RunTypeCounts {
        match run_type {
            RunType::Strict => &self.strict,
            RunType::NonStrict => &self.nonstrict,
        }
    }

    pub fn get_mut(&mut self, run_type: RunType) -> &mut RunTypeCounts {
        match run_type {
            RunType::Strict => &mut self.strict,
            RunType::NonStrict => &mut self.nonstrict,
        }
    }

    pub fn state(&self, run_type: RunType) -> SuiteState {
        self.get(run_type).state()
    }

    /// Sum of two results, used when presenting a subtree
    pub fn merge(&mut self, other: &SuiteResults) {
        for run_type in RunType::ALL {
            let mine = self.get_mut(run_type);
            let theirs = other.get(run_type);
            mine.total += theirs.total;
            mine.success += theirs.success;
            mine.excluded += theirs.excluded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(states: &[TestState]) -> RunTypeCounts {
        let mut c = RunTypeCounts::default();
        for s in states {
            c.record(*s);
        }
        c
    }

    #[test]
    fn test_record_classifies_states() {
        let c = counts(&[
            TestState::WillNotRun,
            TestState::HasNotRun,
            TestState::Success,
            TestState::Failure,
        ]);
        assert_eq!(c.total, 3);
        assert_eq!(c.success, 1);
        assert_eq!(c.excluded, 1);
    }

    #[test]
    fn test_half_success_is_partial() {
        let c = counts(&[
            TestState::Success,
            TestState::Success,
            TestState::Failure,
            TestState::Failure,
        ]);
        assert_eq!(c.state(), SuiteState::PartialSuccess);

        let c = counts(&[
            TestState::Success,
            TestState::Failure,
            TestState::Failure,
            TestState::Failure,
        ]);
        assert_eq!(c.state(), SuiteState::Failure);
    }

    #[test]
    fn test_odd_totals_round_towards_partial() {
        // 2 of 3: 2 >= 1.5
        let c = counts(&[TestState::Success, TestState::Success, TestState::Failure]);
        assert_eq!(c.state(), SuiteState::PartialSuccess);

        // 1 of 3: 1 < 1.5
        let c = counts(&[TestState::Success, TestState::Failure, TestState::HasNotRun]);
        assert_eq!(c.state(), SuiteState::Failure);
    }

    #[test]
    fn test_empty_counts() {
        assert_eq!(RunTypeCounts::default().state(), SuiteState::HasNotRun);
        assert_eq!(counts(&[TestState::WillNotRun]).state(), SuiteState::WillNotRun);
    }

    #[test]
    fn test_all_success() {
        let c = counts(&[TestState::Success, TestState::WillNotRun]);
        assert_eq!(c.state(), SuiteState::Success);
        assert_eq!(c.pass_rate(), 100.0);
    }

    #[test]
    fn test_has_not_run_counts_against_success() {
        let c = counts(&[TestState::HasNotRun, TestState::HasNotRun]);
        assert_eq!(c.state(), SuiteState::Failure);
    }

    #[test]
    fn test_state_serde_names() {
        let json = serde_json::to_string(&SuiteState::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial-success\"");
        let json = serde_json::to_string(&TestState::WillNotRun).unwrap();
        assert_eq!(json, "\"will-not-run\"");
    }

    #[test]
    fn test_merge() {
        let mut a = SuiteResults::default();
        a.strict.record(TestState::Success);
        let mut b = SuiteResults::default();
        b.strict.record(TestState::Failure);
        b.nonstrict.record(TestState::WillNotRun);

        a.merge(&b);
        assert_eq!(a.strict.total, 2);
        assert_eq!(a.strict.success, 1);
        assert_eq!(a.nonstrict.excluded, 1);
    }
}
