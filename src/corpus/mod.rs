//! Suite/test tree
//!
//! The tree is an arena: suites and tests live in two maps keyed by
//! normalized path, and link to each other by path. It is built on one
//! thread and then only read, except for the per-test result slots.

mod discovery;
pub mod path;
mod suite;

pub use discovery::{discover, load_corpus, CorpusEntry};
pub use suite::Suite;
pub use test::Test;

use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::exclusions::{suite_entry, ExclusionError, ExclusionRegistry};
use crate::harness::IncludeError;
use crate::metadata::{MetadataError, ParsedTest};
use crate::models::{Job, RunType, SuiteResults, SuiteState, TestState};

/// Corpus construction and lookup errors
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("can't walk {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata in {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: MetadataError,
    },

    #[error("missing include in {path}: {source}")]
    Include {
        path: String,
        #[source]
        source: IncludeError,
    },

    #[error("no suite for parent directory of {0}")]
    MissingParentSuite(String),

    #[error("test {0} was discovered twice")]
    DuplicateTest(String),

    #[error("no suite or test at {0}")]
    NotFound(String),

    #[error(transparent)]
    Exclusion(#[from] ExclusionError),
}

/// Single-threaded tree construction
#[derive(Debug)]
pub struct CorpusBuilder {
    root: String,
    suites: HashMap<String, Suite>,
    tests: HashMap<String, Test>,
}

impl CorpusBuilder {
    /// Start a tree whose root suite is `root`
    pub fn new(root: &str) -> Self {
        let root = path::normalize(root);
        let mut suites = HashMap::new();
        suites.insert(root.clone(), Suite::new(root.clone()));
        Self {
            root,
            suites,
            tests: HashMap::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Create the suite for `dir`, or return the existing one. Its parent
    /// directory must already be a suite.
    pub fn add_suite(&mut self, dir: &str) -> Result<&Suite, CorpusError> {
        let dir = path::normalize(dir);
        if !self.suites.contains_key(&dir) {
            let parent = self
                .suites
                .get_mut(path::parent(&dir))
                .ok_or_else(|| CorpusError::MissingParentSuite(dir.clone()))?;
            parent.push_suite(dir.clone());
            self.suites.insert(dir.clone(), Suite::new(dir.clone()));
        }
        Ok(&self.suites[&dir])
    }

    /// Create a test and link it into its suite and every ancestor up to the root
    pub fn add_test(&mut self, file: &str, parsed: ParsedTest) -> Result<(), CorpusError> {
        let file = path::normalize(file);
        if self.tests.contains_key(&file) {
            return Err(CorpusError::DuplicateTest(file));
        }

        let dir = path::parent(&file).to_string();
        let suite = self
            .suites
            .get_mut(&dir)
            .ok_or_else(|| CorpusError::MissingParentSuite(file.clone()))?;
        suite.push_test(file.clone());

        let mut ancestors = Vec::new();
        let mut current = dir;
        loop {
            ancestors.push(current.clone());
            if current == self.root {
                break;
            }
            let next = path::parent(&current).to_string();
            if next == current || !self.suites.contains_key(&next) {
                break;
            }
            current = next;
        }

        self.tests
            .insert(file.clone(), Test::new(file, parsed, ancestors));
        Ok(())
    }

    pub fn finish(self, exclusions: ExclusionRegistry) -> Corpus {
        debug!(
            "Built corpus at {}: {} suites, {} tests",
            self.root,
            self.suites.len(),
            self.tests.len()
        );
        Corpus {
            root: self.root,
            suites: self.suites,
            tests: self
                .tests
                .into_iter()
                .map(|(path, test)| (path, Arc::new(test)))
                .collect(),
            exclusions: RwLock::new(exclusions),
        }
    }
}

/// A fully built corpus together with its exclusion registry
#[derive(Debug)]
pub struct Corpus {
    root: String,
    suites: HashMap<String, Suite>,
    tests: HashMap<String, Arc<Test>>,
    exclusions: RwLock<ExclusionRegistry>,
}

impl Corpus {
    /// Build the tree from discovered entries. `load` supplies the parsed
    /// contents of each test file.
    pub fn build<I, F>(
        root: &str,
        entries: I,
        exclusions: ExclusionRegistry,
        mut load: F,
    ) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = CorpusEntry>,
        F: FnMut(&str) -> Result<ParsedTest, CorpusError>,
    {
        let mut builder = CorpusBuilder::new(root);
        for entry in entries {
            if entry.is_dir {
                builder.add_suite(&entry.path)?;
            } else {
                let parsed = load(&entry.path)?;
                builder.add_test(&entry.path, parsed)?;
            }
        }
        Ok(builder.finish(exclusions))
    }

    pub fn root_path(&self) -> &str {
        &self.root
    }

    pub fn root(&self) -> &Suite {
        &self.suites[&self.root]
    }

    pub fn suite(&self, path: &str) -> Option<&Suite> {
        self.suites.get(&path::normalize(path))
    }

    pub fn test(&self, path: &str) -> Option<&Arc<Test>> {
        self.tests.get(&path::normalize(path))
    }

    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn tests(&self) -> impl Iterator<Item = &Arc<Test>> {
        self.tests.values()
    }

    pub fn suite_tests<'a>(&'a self, suite: &'a Suite) -> impl Iterator<Item = &'a Arc<Test>> {
        suite.test_paths().iter().filter_map(|p| self.tests.get(p))
    }

    pub fn child_suites<'a>(&'a self, suite: &'a Suite) -> impl Iterator<Item = &'a Suite> {
        suite.suite_paths().iter().filter_map(|p| self.suites.get(p))
    }

    /// All jobs for the suite or test at `path`
    pub fn run_jobs(&self, path: &str) -> Result<Vec<Job>, CorpusError> {
        if let Some(suite) = self.suite(path) {
            Ok(suite.determine_run_jobs(self))
        } else if let Some(test) = self.test(path) {
            Ok(test.determine_run_jobs())
        } else {
            Err(CorpusError::NotFound(path.to_string()))
        }
    }

    /// Jobs for `path` whose tests are not excluded
    pub fn runnable_jobs(&self, path: &str) -> Result<Vec<Job>, CorpusError> {
        let jobs = self.run_jobs(path)?;
        let exclusions = self.exclusions();
        Ok(jobs
            .into_iter()
            .filter(|job| !exclusions.is_excluded(job.path()))
            .collect())
    }

    pub fn exclusions(&self) -> RwLockReadGuard<'_, ExclusionRegistry> {
        self.exclusions.read()
    }

    pub fn test_state(&self, test: &Test, run_type: RunType) -> TestState {
        test.state(run_type, &self.exclusions())
    }

    pub fn suite_results(&self, suite: &Suite) -> SuiteResults {
        suite.calculate_results(self)
    }

    pub fn suite_state(&self, suite: &Suite, run_type: RunType) -> SuiteState {
        suite.state(self, run_type)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclusions().is_excluded(path)
    }

    pub fn is_suite_excluded(&self, suite: &Suite) -> bool {
        self.is_excluded(&suite_entry(suite.path()))
    }

    pub fn set_test_excluded(&self, test: &Test, excluded: bool) -> Result<(), CorpusError> {
        self.exclusions
            .write()
            .set_excluded(test.path(), excluded)?;
        Ok(())
    }

    pub fn set_suite_excluded(&self, suite: &Suite, excluded: bool) -> Result<(), CorpusError> {
        // Paths under a `.` root carry no `./` prefix, so its entry would match nothing
        if suite.path() == "." {
            return Err(ExclusionError::InvalidEntry(suite_entry(suite.path())).into());
        }
        self.exclusions
            .write()
            .set_excluded(&suite_entry(suite.path()), excluded)?;
        Ok(())
    }

    /// Exclude or include whatever lives at `path`
    pub fn set_excluded(&self, path: &str, excluded: bool) -> Result<(), CorpusError> {
        if let Some(suite) = self.suite(path) {
            self.set_suite_excluded(suite, excluded)
        } else if let Some(test) = self.test(path) {
            self.set_test_excluded(test, excluded)
        } else {
            Err(CorpusError::NotFound(path.to_string()))
        }
    }
}
