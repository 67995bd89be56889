//! Directory-scoped groups of tests

use super::Corpus;
use crate::models::{Job, RunType, SuiteResults, SuiteState};

/// A directory in the corpus. Tests and child suites are held by path and
/// resolved through the owning [`Corpus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suite {
    path: String,
    tests: Vec<String>,
    suites: Vec<String>,
}

impl Suite {
    pub(crate) fn new(path: String) -> Self {
        Self {
            path,
            tests: Vec::new(),
            suites: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Paths of tests whose immediate parent is this suite
    pub fn test_paths(&self) -> &[String] {
        &self.tests
    }

    /// Paths of direct child suites
    pub fn suite_paths(&self) -> &[String] {
        &self.suites
    }

    pub(crate) fn push_test(&mut self, path: String) {
        self.tests.push(path);
    }

    pub(crate) fn push_suite(&mut self, path: String) {
        self.suites.push(path);
    }

    /// Jobs for this suite's tests, then for every child suite recursively
    pub fn determine_run_jobs(&self, corpus: &Corpus) -> Vec<Job> {
        let mut jobs: Vec<Job> = corpus
            .suite_tests(self)
            .flat_map(|test| test.determine_run_jobs())
            .collect();

        for child in corpus.child_suites(self) {
            jobs.extend(child.determine_run_jobs(corpus));
        }

        jobs
    }

    /// Tally the directly owned tests. Child suites are not included.
    pub fn calculate_results(&self, corpus: &Corpus) -> SuiteResults {
        let exclusions = corpus.exclusions();
        let mut results = SuiteResults::default();

        for test in corpus.suite_tests(self) {
            for run_type in RunType::ALL {
                results
                    .get_mut(run_type)
                    .record(test.state(run_type, &exclusions));
            }
        }

        results
    }

    pub fn state(&self, corpus: &Corpus, run_type: RunType) -> SuiteState {
        self.calculate_results(corpus).state(run_type)
    }

    /// Results of this suite merged with every descendant suite
    pub fn subtree_results(&self, corpus: &Corpus) -> SuiteResults {
        let mut results = self.calculate_results(corpus);
        for child in corpus.child_suites(self) {
            results.merge(&child.subtree_results(corpus));
        }
        results
    }
}
