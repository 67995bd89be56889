//! Conformance Runner - concurrent runner for script-engine conformance suites
//!
//! Loads a directory tree of conformance tests, runs every test in strict
//! and non-strict mode on a pool of workers and rolls the outcomes up the
//! suite tree.
//!
//! ## Usage
//!
//! ```bash
//! # Run a whole suite
//! conformance-runner run test/built-ins/Array --workers 8
//!
//! # Show the suite tree with states from the latest run
//! conformance-runner list test/language --depth 1
//!
//! # Print what the engine would see for one test
//! conformance-runner source strict test/language/types/null/S8.2_A1_T1.js
//!
//! # Keep a directory out of runs and rollups
//! conformance-runner exclude test/intl402
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use conformance_runner::cli::{self, Args};
use conformance_runner::config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use conformance_runner::corpus::{self, path, Corpus};
use conformance_runner::exclusions::ExclusionRegistry;
use conformance_runner::executor::{JobQueue, ProcessExecutor, WorkerPool};
use conformance_runner::harness::HarnessIncludes;
use conformance_runner::models::RunType;
use conformance_runner::output::{OutputFormat, ResultFormatter, SuiteNode};
use conformance_runner::results::{ExportFormat, ResultsStorage, RunReport};
use conformance_runner::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::from_verbose(args.verbose), env.log.as_deref());

    let config = load_config(&args, &env)?;

    match args.command {
        cli::Command::Run(run_args) => {
            run_corpus(config, run_args).await?;
        }
        cli::Command::List(list_args) => {
            list_suites(&config, list_args)?;
        }
        cli::Command::Source(source_args) => {
            print_source(&config, source_args)?;
        }
        cli::Command::Exclude(path_args) => {
            set_exclusion(&config, &path_args.path, true)?;
        }
        cli::Command::Include(path_args) => {
            set_exclusion(&config, &path_args.path, false)?;
        }
        cli::Command::Results(results_args) => {
            show_results(&config, results_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(&config, config_args)?;
        }
    }

    Ok(())
}

/// File, then environment, then command line
fn load_config(args: &Args, env: &EnvConfig) -> Result<AppConfig> {
    let file = match args.config.as_ref().or(env.config_file.as_ref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut config = file.app;
    config.apply_env(env);

    if let Some(root) = &args.root {
        config.corpus_root = root.into();
    }
    if let Some(harness) = &args.harness {
        config.harness_dir = harness.into();
    }
    if let Some(expectations) = &args.expectations {
        config.expectations_file = expectations.into();
    }

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(format).ok_or_else(|| anyhow::anyhow!("Unknown output format: {format}"))
}

/// Harness cache, exclusions and the linked corpus tree
fn load_corpus(config: &AppConfig) -> Result<(Corpus, Arc<HarnessIncludes>)> {
    let includes = HarnessIncludes::load(&config.harness_dir).with_context(|| {
        format!(
            "Failed to load harness includes from {}",
            config.harness_dir.display()
        )
    })?;

    let exclusions = ExclusionRegistry::load(&config.expectations_file).with_context(|| {
        format!(
            "Failed to load exclusions from {}",
            config.expectations_file.display()
        )
    })?;

    let root = config.corpus_root.to_string_lossy();
    let corpus = corpus::load_corpus(&root, &includes, exclusions)
        .with_context(|| format!("Failed to load corpus at {root}"))?;

    Ok((corpus, Arc::new(includes)))
}

/// Accept paths as listed or relative to the corpus root
fn resolve_target(corpus: &Corpus, input: &str) -> Result<String> {
    let normalized = path::normalize(input);
    let candidates = [
        normalized.clone(),
        path::normalize(&path::join(corpus.root_path(), &normalized)),
    ];

    candidates
        .into_iter()
        .find(|p| corpus.suite(p).is_some() || corpus.test(p).is_some())
        .ok_or_else(|| anyhow::anyhow!("No suite or test at {input}"))
}

/// Feed stored results back into the tree so states survive between
/// invocations
fn replay_results(corpus: &Corpus, storage: &ResultsStorage) {
    if let Err(e) = storage.replay_into(corpus) {
        warn!("Failed to read stored results: {e}");
    }
}

async fn run_corpus(mut config: AppConfig, args: cli::RunArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(engine) = args.engine {
        config.executor.program = engine;
    }
    if let Some(timeout) = args.timeout {
        config.executor.default_timeout_secs = Some(timeout);
    }
    let format = parse_format(&args.format)?;

    let (corpus, includes) = load_corpus(&config)?;
    let target = resolve_target(&corpus, &args.path)?;
    let jobs = corpus.runnable_jobs(&target)?;
    let workers = config.worker_count();

    info!(
        "Running {} jobs from {} on {} workers with {}",
        jobs.len(),
        target,
        workers,
        config.executor.program
    );

    let executor = ProcessExecutor::new(&config.executor.program)
        .with_args(config.executor.args.clone())
        .with_default_timeout(config.executor.default_timeout());
    let pool = WorkerPool::with_workers(workers, Arc::new(executor), includes);
    let (queue, mut stream) = JobQueue::new(&pool);

    let submitter = tokio::spawn({
        let queue = queue.clone();
        async move { queue.submit(jobs).await }
    });
    let interrupt = tokio::spawn({
        let queue = queue.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for running tests to finish");
                queue.cancel();
            }
        }
    });

    let formatter = ResultFormatter::new(format);
    let mut report = RunReport::new(target.as_str(), config.executor.program.as_str(), workers);

    if let Some(header) = formatter.result_header() {
        println!("{header}");
    }
    while let Some(outcome) = stream.recv().await {
        match outcome {
            Ok(result) => {
                if !args.quiet || !result.success {
                    println!("{}", formatter.format_result(&result));
                }
                report.record(result);
            }
            Err(e) => {
                error!("{e}");
                report.fatal_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    interrupt.abort();
    submitter.await.context("Job submission task failed")??;

    let suite = corpus.suite(&target);
    report.finish(
        queue.is_cancelled(),
        suite.map(|s| s.subtree_results(&corpus)),
    );

    if matches!(format, OutputFormat::Table | OutputFormat::Summary) {
        if let Some(suite) = suite {
            let node = SuiteNode::build(&corpus, suite, 1);
            println!("{}", formatter.format_suite_tree(&node).trim_end());
        }
        println!("{}", formatter.format_report(&report));
    }

    let storage = ResultsStorage::new(&config.results_dir);
    if !args.no_save {
        storage.save(&report)?;
    }
    if let Some(output) = &args.output {
        let path = Path::new(output);
        let export = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        storage.export(&report, path, export)?;
        println!("✓ Report written to {output}");
    }

    if let Some(error) = &report.fatal_error {
        anyhow::bail!("Run aborted: {error}");
    }

    Ok(())
}

fn list_suites(config: &AppConfig, args: cli::ListArgs) -> Result<()> {
    let formatter = ResultFormatter::new(parse_format(&args.format)?);

    let (corpus, _) = load_corpus(config)?;
    replay_results(&corpus, &ResultsStorage::new(&config.results_dir));

    let target = resolve_target(&corpus, &args.path)?;
    let suite = corpus
        .suite(&target)
        .ok_or_else(|| anyhow::anyhow!("{target} is a test, not a suite"))?;

    let node = SuiteNode::build(&corpus, suite, args.depth.unwrap_or(usize::MAX));
    println!("{}", formatter.format_suite_tree(&node).trim_end());

    if args.tests {
        print!("{}", formatter.format_test_states(&corpus, suite));
    }

    Ok(())
}

fn print_source(config: &AppConfig, args: cli::SourceArgs) -> Result<()> {
    let run_type = RunType::from_str(&args.run_type).ok_or_else(|| {
        anyhow::anyhow!("Unknown run type: {}. Use 'strict' or 'nonstrict'.", args.run_type)
    })?;

    let (corpus, includes) = load_corpus(config)?;
    let target = resolve_target(&corpus, &args.path)?;
    let test = corpus
        .test(&target)
        .ok_or_else(|| anyhow::anyhow!("{target} is a suite, not a test"))?;

    if !test.has_run_type(run_type) {
        warn!("{} is never run in {} mode", target, run_type);
    }

    let source = test
        .assemble_source(run_type, &includes)
        .with_context(|| format!("Failed to assemble {target}"))?;
    print!("{source}");

    Ok(())
}

fn set_exclusion(config: &AppConfig, input: &str, excluded: bool) -> Result<()> {
    let (corpus, _) = load_corpus(config)?;
    let target = resolve_target(&corpus, input)?;

    corpus.set_excluded(&target, excluded)?;

    let verb = if excluded { "Excluded" } else { "Included" };
    println!(
        "✓ {verb} {target} ({})",
        config.expectations_file.display()
    );
    Ok(())
}

fn show_results(config: &AppConfig, args: cli::ResultsArgs) -> Result<()> {
    let storage = ResultsStorage::new(&config.results_dir);
    let formatter = ResultFormatter::new(parse_format(&args.format)?);

    let report = match (&args.id, args.latest) {
        (Some(id), _) => Some(storage.load(id)?),
        (None, true) => storage.latest()?,
        (None, false) => None,
    };

    if let Some(report) = report {
        println!("{}", formatter.format_report(&report));

        if let Some(export) = &args.export {
            let path = Path::new(export);
            let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
            storage.export(&report, path, format)?;
            println!("✓ Exported to {export}");
        }
        return Ok(());
    }

    let runs = storage.list()?;
    if runs.is_empty() {
        println!("No stored runs in {}", storage.base_dir().display());
        return Ok(());
    }

    println!(
        "{:28} {:20} {:>8} {:>8} {:>7}  Target",
        "ID", "Started", "Passed", "Total", "Rate"
    );
    println!("{:-<90}", "");
    for run in runs {
        println!(
            "{:28} {:20} {:>8} {:>8} {:>6.1}%  {}{}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.totals.passed,
            run.totals.total,
            run.totals.pass_rate(),
            run.target,
            if run.cancelled { " (cancelled)" } else { "" }
        );
    }

    Ok(())
}

fn manage_config(config: &AppConfig, args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            let target = Path::new(&path);
            if target.exists() && !force {
                anyhow::bail!("Configuration file already exists: {path}. Use --force to overwrite.");
            }

            ConfigFile::example().save(target)?;
            println!("✓ Configuration file created: {path}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            let effective = ConfigFile {
                app: config.clone(),
                ..ConfigFile::default()
            };
            if let Some(path) = ConfigFile::find() {
                println!("# Loaded from {}", path.display());
            }
            println!("{}", serde_yaml::to_string(&effective)?);
        }

        cli::ConfigAction::Env => {
            print_env_help();

            let env = EnvConfig::load();
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
    }

    Ok(())
}
