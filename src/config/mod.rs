//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::exclusions::DEFAULT_EXPECTATIONS_FILE;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of the test corpus
    pub corpus_root: PathBuf,

    /// Directory holding harness include files
    pub harness_dir: PathBuf,

    /// Exclusion list, one path per line
    pub expectations_file: PathBuf,

    /// Where run reports are stored
    pub results_dir: PathBuf,

    /// Worker pool size. Defaults to available parallelism minus one.
    pub workers: Option<usize>,

    /// Script engine settings
    pub executor: ExecutorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("test"),
            harness_dir: PathBuf::from("harness"),
            expectations_file: PathBuf::from(DEFAULT_EXPECTATIONS_FILE),
            results_dir: PathBuf::from("results"),
            workers: None,
            executor: ExecutorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layer environment overrides on top of this configuration
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(root) = &env.corpus_root {
            self.corpus_root = PathBuf::from(root);
        }
        if let Some(harness) = &env.harness_dir {
            self.harness_dir = PathBuf::from(harness);
        }
        if let Some(expectations) = &env.expectations_file {
            self.expectations_file = PathBuf::from(expectations);
        }
        if let Some(workers) = env.workers {
            self.workers = Some(workers);
        }
        if let Some(engine) = &env.engine {
            self.executor.program = engine.clone();
        }
        if let Some(timeout) = env.timeout {
            self.executor.default_timeout_secs = Some(timeout);
        }
    }

    /// Worker count after applying the default
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(crate::executor::default_worker_count)
    }
}

/// Script engine invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Engine binary; the assembled test file path is appended to `args`
    pub program: String,

    /// Extra arguments placed before the test file
    pub args: Vec<String>,

    /// Applied when a test declares no timeout of its own
    pub default_timeout_secs: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "qmljs".to_string(),
            args: Vec::new(),
            default_timeout_secs: Some(60),
        }
    }
}

impl ExecutorConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}
