//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Concurrent runner for script-engine conformance corpora
#[derive(Parser, Debug)]
#[command(name = "conformance-runner")]
#[command(version)]
#[command(about = "Run a hierarchical conformance test corpus in strict and non-strict mode")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Corpus root directory
    #[arg(long, global = true)]
    pub root: Option<String>,

    /// Harness include directory
    #[arg(long, global = true)]
    pub harness: Option<String>,

    /// Exclusion list file
    #[arg(long, global = true)]
    pub expectations: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a suite or a single test
    Run(RunArgs),

    /// Show the suite tree with rolled-up states. Each test shows its most
    /// recent stored result across all saved runs.
    List(ListArgs),

    /// Print the assembled source of a test
    Source(SourceArgs),

    /// Exclude a suite or test from runs and rollups
    Exclude(PathArgs),

    /// Remove a suite or test from the exclusion list
    Include(PathArgs),

    /// View stored run reports
    Results(ResultsArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite directory or test file, relative to the corpus root or as listed
    #[arg(default_value = ".")]
    pub path: String,

    /// Number of workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Engine binary
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Default per-test timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Only print failures while streaming
    #[arg(short, long)]
    pub quiet: bool,

    /// Write the JSON run report to this file as well
    #[arg(short, long)]
    pub output: Option<String>,

    /// Do not store the run report in the results directory
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite to show
    #[arg(default_value = ".")]
    pub path: String,

    /// How many levels of child suites to show
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Also list the suite's own tests
    #[arg(short, long)]
    pub tests: bool,

    /// Output format (table, json, json-pretty, csv)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for source command
#[derive(Parser, Debug)]
pub struct SourceArgs {
    /// Run type (strict, nonstrict)
    pub run_type: String,

    /// Test file
    pub path: String,
}

/// A single suite or test path
#[derive(Parser, Debug)]
pub struct PathArgs {
    pub path: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Show this run instead of listing
    #[arg(short, long)]
    pub id: Option<String>,

    /// Show the most recent run
    #[arg(short, long)]
    pub latest: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export to file (.json or .csv)
    #[arg(short, long)]
    pub export: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write an example configuration file
    Init {
        /// Destination file
        #[arg(default_value = "conformance-runner.yaml")]
        path: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Describe the environment variables
    Env,
}
