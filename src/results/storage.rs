//! Results storage and retrieval
//!
//! Provides persistent storage for run reports in JSON format.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::models::{RunType, SuiteResults, TestResult};

/// One `run` invocation and everything it produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID
    pub id: String,

    /// Suite or test path that was run
    pub target: String,

    /// Engine binary used
    pub engine: String,

    /// Worker pool size
    pub workers: usize,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Stopped early by the user or by a fatal error
    pub cancelled: bool,

    /// Message of the fatal error that ended the run, if any
    pub fatal_error: Option<String>,

    /// Results in completion order
    pub results: Vec<TestResult>,

    /// Rolled-up counts for the target subtree after the run
    pub suite_results: Option<SuiteResults>,
}

/// Pass/fail tallies over a report's results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunTotals {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }
}

impl RunReport {
    pub fn new(target: impl Into<String>, engine: impl Into<String>, workers: usize) -> Self {
        Self {
            id: generate_run_id(),
            target: target.into(),
            engine: engine.into(),
            workers,
            started_at: Utc::now(),
            completed_at: None,
            cancelled: false,
            fatal_error: None,
            results: Vec::new(),
            suite_results: None,
        }
    }

    pub fn record(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Stamp completion time and final rollup
    pub fn finish(&mut self, cancelled: bool, suite_results: Option<SuiteResults>) {
        self.completed_at = Some(Utc::now());
        self.cancelled = cancelled;
        self.suite_results = suite_results;
    }

    pub fn totals(&self) -> RunTotals {
        let passed = self.results.iter().filter(|r| r.success).count();
        RunTotals {
            total: self.results.len(),
            passed,
            failed: self.results.len() - passed,
        }
    }

    /// Tallies restricted to one run type
    pub fn totals_for(&self, run_type: RunType) -> RunTotals {
        let mut totals = RunTotals::default();
        for result in self.results.iter().filter(|r| r.run_type == run_type) {
            totals.total += 1;
            if result.success {
                totals.passed += 1;
            } else {
                totals.failed += 1;
            }
        }
        totals
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Short listing entry for a stored report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub totals: RunTotals,
    pub cancelled: bool,
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
    format!("{timestamp}_{}", std::process::id())
}

/// Results storage manager
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
}

impl ResultsStorage {
    /// Create a new results storage
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ensure storage directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create results directory: {}", self.base_dir.display())
        })?;
        Ok(())
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Save a run report
    pub fn save(&self, report: &RunReport) -> Result<PathBuf> {
        self.ensure_dir()?;

        let path = self.run_path(&report.id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, report).context("Failed to write results")?;

        info!("Saved run report to {}", path.display());
        Ok(path)
    }

    /// Load a run report by ID
    pub fn load(&self, run_id: &str) -> Result<RunReport> {
        let path = self.run_path(run_id);
        let report = self.load_from_path(&path)?;
        debug!("Loaded run report from {}", path.display());
        Ok(report)
    }

    /// Load from a specific path
    pub fn load_from_path(&self, path: &Path) -> Result<RunReport> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Failed to parse results")
    }

    /// Every readable report, newest first
    pub fn load_all(&self) -> Result<Vec<RunReport>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        debug!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(reports)
    }

    /// List stored runs, newest first
    pub fn list(&self) -> Result<Vec<RunInfo>> {
        Ok(self
            .load_all()?
            .into_iter()
            .map(|report| RunInfo {
                totals: report.totals(),
                id: report.id,
                target: report.target,
                started_at: report.started_at,
                cancelled: report.cancelled,
            })
            .collect())
    }

    /// Most recent run
    pub fn latest(&self) -> Result<Option<RunReport>> {
        Ok(self.load_all()?.into_iter().next())
    }

    /// Feed every stored result back into `corpus`, oldest run first, so
    /// each test and run type keeps its most recent result even when the
    /// latest run covered only part of the tree. Returns how many results
    /// matched a test.
    pub fn replay_into(&self, corpus: &Corpus) -> Result<usize> {
        let reports = self.load_all()?;
        let runs = reports.len();

        let mut replayed = 0;
        for report in reports.into_iter().rev() {
            for result in report.results {
                if let Some(test) = corpus.test(&result.path) {
                    test.record_result(result);
                    replayed += 1;
                }
            }
        }

        debug!("Replayed {} results from {} runs", replayed, runs);
        Ok(replayed)
    }

    /// Delete a run
    pub fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.run_path(run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted results: {}", path.display());
        }
        Ok(())
    }

    /// Export a report to a file
    pub fn export(&self, report: &RunReport, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                let writer = BufWriter::new(file);
                serde_json::to_writer_pretty(writer, report)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                writer.write_record(["path", "run_type", "success", "duration_ms", "stderr"])?;
                for result in &report.results {
                    writer.write_record([
                        result.path.as_str(),
                        result.run_type.name(),
                        if result.success { "true" } else { "false" },
                        result.duration_ms.to_string().as_str(),
                        result.stderr.trim(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported run {} to {}", report.id, path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn result(path: &str, run_type: RunType, success: bool) -> TestResult {
        TestResult {
            path: path.to_string(),
            run_type,
            success,
            stderr: if success { String::new() } else { "Test262Error\n".to_string() },
            stdout: String::new(),
            duration_ms: 7,
        }
    }

    fn sample_report(target: &str) -> RunReport {
        let mut report = RunReport::new(target, "qmljs", 2);
        report.record(result("test/a.js", RunType::Strict, true));
        report.record(result("test/a.js", RunType::NonStrict, false));
        report.record(result("test/b.js", RunType::Strict, true));
        report
    }

    #[test]
    fn test_report_totals() {
        let report = sample_report("test");
        let totals = report.totals();
        assert_eq!(totals, RunTotals { total: 3, passed: 2, failed: 1 });
        assert_eq!(report.totals_for(RunType::NonStrict).failed, 1);
        assert!(report.duration_ms().is_none());
        assert_eq!(RunTotals::default().pass_rate(), 0.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("results"));

        let mut report = sample_report("test/built-ins");
        report.finish(false, Some(SuiteResults::default()));
        let path = storage.save(&report).unwrap();
        assert!(path.exists());

        let loaded = storage.load(&report.id).unwrap();
        assert_eq!(loaded.target, "test/built-ins");
        assert_eq!(loaded.results, report.results);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn test_list_newest_first() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let mut older = sample_report("old");
        older.id = "older".to_string();
        older.started_at = Utc::now() - Duration::hours(1);
        let mut newer = sample_report("new");
        newer.id = "newer".to_string();
        storage.save(&older).unwrap();
        storage.save(&newer).unwrap();
        std::fs::write(dir.path().join("junk.json"), "not json").unwrap();

        let runs = storage.list().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "newer");
        assert_eq!(runs[1].totals.total, 3);
        assert_eq!(storage.latest().unwrap().unwrap().target, "new");

        storage.delete("older").unwrap();
        assert_eq!(storage.list().unwrap().len(), 1);
    }

    #[test]
    fn test_replay_merges_runs_newest_wins() {
        use crate::corpus::CorpusBuilder;
        use crate::exclusions::ExclusionRegistry;
        use crate::metadata::ParsedTest;
        use crate::models::TestState;

        let mut builder = CorpusBuilder::new("test");
        builder.add_test("test/a.js", ParsedTest::default()).unwrap();
        builder.add_test("test/b.js", ParsedTest::default()).unwrap();
        let corpus = builder.finish(ExclusionRegistry::in_memory());

        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let mut older = RunReport::new("test", "qmljs", 2);
        older.id = "older".to_string();
        older.started_at = Utc::now() - Duration::hours(1);
        older.record(result("test/a.js", RunType::Strict, true));
        older.record(result("test/b.js", RunType::Strict, true));
        older.record(result("test/gone.js", RunType::Strict, true));

        // Later run of a single test
        let mut newer = RunReport::new("test/a.js", "qmljs", 2);
        newer.id = "newer".to_string();
        newer.record(result("test/a.js", RunType::Strict, false));

        storage.save(&newer).unwrap();
        storage.save(&older).unwrap();

        assert_eq!(storage.replay_into(&corpus).unwrap(), 3);

        let a = corpus.test("test/a.js").unwrap();
        let b = corpus.test("test/b.js").unwrap();
        assert_eq!(corpus.test_state(a, RunType::Strict), TestState::Failure);
        assert_eq!(corpus.test_state(b, RunType::Strict), TestState::Success);
        assert_eq!(corpus.test_state(b, RunType::NonStrict), TestState::HasNotRun);
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("absent"));
        assert!(storage.list().unwrap().is_empty());
        assert!(storage.latest().unwrap().is_none());
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let path = dir.path().join("run.csv");

        storage
            .export(&sample_report("test"), &path, ExportFormat::Csv)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("path,run_type,success,duration_ms,stderr"));
        assert_eq!(lines.nth(1), Some("test/a.js,nonstrict,false,7,Test262Error"));
    }

    #[test]
    fn test_export_format() {
        assert_eq!(ExportFormat::from_str("JSON"), Some(ExportFormat::Json));
        assert_eq!(
            ExportFormat::from_extension(Path::new("out.csv")),
            Some(ExportFormat::Csv)
        );
        assert!(ExportFormat::from_str("xml").is_none());
    }
}
