//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "CONFORMANCE_RUNNER";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Corpus root from CONFORMANCE_RUNNER_ROOT
    pub corpus_root: Option<String>,
    /// Harness directory from CONFORMANCE_RUNNER_HARNESS
    pub harness_dir: Option<String>,
    /// Exclusion list from CONFORMANCE_RUNNER_EXPECTATIONS
    pub expectations_file: Option<String>,
    /// Pool size from CONFORMANCE_RUNNER_WORKERS
    pub workers: Option<usize>,
    /// Engine binary from CONFORMANCE_RUNNER_ENGINE
    pub engine: Option<String>,
    /// Default timeout in seconds from CONFORMANCE_RUNNER_TIMEOUT
    pub timeout: Option<u64>,
    /// Config file from CONFORMANCE_RUNNER_CONFIG
    pub config_file: Option<String>,
    /// Log filter from CONFORMANCE_RUNNER_LOG
    pub log: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            corpus_root: get_env("ROOT"),
            harness_dir: get_env("HARNESS"),
            expectations_file: get_env("EXPECTATIONS"),
            workers: get_env_parse("WORKERS"),
            engine: get_env("ENGINE"),
            timeout: get_env_parse("TIMEOUT"),
            config_file: get_env("CONFIG"),
            log: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.corpus_root.is_some()
            || self.harness_dir.is_some()
            || self.expectations_file.is_some()
            || self.workers.is_some()
            || self.engine.is_some()
            || self.timeout.is_some()
            || self.config_file.is_some()
            || self.log.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_ROOT:         {:?}", ENV_PREFIX, self.corpus_root);
        println!("  {}_HARNESS:      {:?}", ENV_PREFIX, self.harness_dir);
        println!("  {}_EXPECTATIONS: {:?}", ENV_PREFIX, self.expectations_file);
        println!("  {}_WORKERS:      {:?}", ENV_PREFIX, self.workers);
        println!("  {}_ENGINE:       {:?}", ENV_PREFIX, self.engine);
        println!("  {}_TIMEOUT:      {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_CONFIG:       {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:          {:?}", ENV_PREFIX, self.log);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn corpus_root(self, root: impl Into<String>) -> Self {
        self.var("ROOT", root)
    }

    pub fn workers(self, workers: usize) -> Self {
        self.var("WORKERS", workers.to_string())
    }

    pub fn engine(self, engine: impl Into<String>) -> Self {
        self.var("ENGINE", engine)
    }

    pub fn timeout(self, timeout: u64) -> Self {
        self.var("TIMEOUT", timeout.to_string())
    }

    /// Set an arbitrary prefixed variable
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all CONFORMANCE_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_ROOT          Root directory of the test corpus");
    println!("  {ENV_PREFIX}_HARNESS       Directory holding harness includes");
    println!("  {ENV_PREFIX}_EXPECTATIONS  Exclusion list file");
    println!("  {ENV_PREFIX}_WORKERS       Worker pool size");
    println!("  {ENV_PREFIX}_ENGINE        Script engine binary");
    println!("  {ENV_PREFIX}_TIMEOUT       Default per-test timeout in seconds");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  {ENV_PREFIX}_LOG           Log filter (e.g. debug, conformance_runner=trace)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_ENGINE=/usr/local/bin/qmljs");
    println!("  export {ENV_PREFIX}_WORKERS=8");
    println!("  conformance-runner run test/built-ins");
}
