//! Output formatters for run results
//!
//! Provides table, JSON, CSV and summary output formats.

use serde::Serialize;

use crate::corpus::{Corpus, Suite};
use crate::models::{RunType, SuiteResults, SuiteState, TestResult, TestState};
use crate::results::RunReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Serializable view of a suite and its descendants
#[derive(Debug, Serialize)]
pub struct SuiteNode {
    pub path: String,
    pub strict: SuiteState,
    pub nonstrict: SuiteState,
    pub results: SuiteResults,
    pub excluded: bool,
    pub suites: Vec<SuiteNode>,
}

impl SuiteNode {
    /// Snapshot `suite` and, down to `depth` further levels, its children
    pub fn build(corpus: &Corpus, suite: &Suite, depth: usize) -> Self {
        let results = corpus.suite_results(suite);
        let suites = if depth == 0 {
            Vec::new()
        } else {
            corpus
                .child_suites(suite)
                .map(|child| SuiteNode::build(corpus, child, depth - 1))
                .collect()
        };

        Self {
            path: suite.path().to_string(),
            strict: results.state(RunType::Strict),
            nonstrict: results.state(RunType::NonStrict),
            results,
            excluded: corpus.is_suite_excluded(suite),
            suites,
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    path: &'a str,
    run_type: &'a str,
    success: bool,
    duration_ms: u64,
    stderr: &'a str,
}

impl<'a> From<&'a TestResult> for CsvRow<'a> {
    fn from(result: &'a TestResult) -> Self {
        Self {
            path: &result.path,
            run_type: result.run_type.name(),
            success: result.success,
            duration_ms: result.duration_ms,
            stderr: result.stderr.trim(),
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single test result, as it streams in
    pub fn format_result(&self, result: &TestResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Csv => csv_rows(std::iter::once(result), false),
            OutputFormat::Summary => self.format_result_summary(result),
        }
    }

    /// Header line to print before streamed results, if the format has one
    pub fn result_header(&self) -> Option<String> {
        match self.format {
            OutputFormat::Csv => Some(csv_rows(std::iter::empty(), true)),
            _ => None,
        }
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let status_str = match (result.success, self.colorize) {
            (true, true) => "\x1b[32m✓ PASS\x1b[0m",
            (false, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (true, false) => "✓ PASS",
            (false, false) => "✗ FAIL",
        };

        let mut line = format!(
            "{} {} ({}) [{:>6}ms]",
            status_str, result.path, result.run_type, result.duration_ms
        );
        if !result.success {
            if let Some(first) = result.stderr.lines().find(|l| !l.trim().is_empty()) {
                line.push_str("\n    ");
                line.push_str(first.trim());
            }
        }
        line
    }

    fn format_result_summary(&self, result: &TestResult) -> String {
        format!(
            "{} {} ({}ms)",
            result.symbol(),
            result.file_name(),
            result.duration_ms
        )
    }

    /// Format the report of a finished run
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Csv => csv_rows(report.results.iter(), true),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let totals = report.totals();
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  Run {:56} ║\n", truncate(&report.id, 56)));
        output.push_str(&format!("║  Target: {:52} ║\n", truncate(&report.target, 52)));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for run_type in RunType::ALL {
            let t = report.totals_for(run_type);
            output.push_str(&format!(
                "║  {:10} {:6} run | {:6} pass | {:6} fail                ║\n",
                run_type.name(),
                t.total,
                t.passed,
                t.failed
            ));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let pass_str = self.paint(&totals.passed.to_string(), Color::Green, true);
        let fail_str = self.paint(&totals.failed.to_string(), Color::Red, totals.failed > 0);
        output.push_str(&format!(
            "║  Total: {:6} | Pass: {} | Fail: {}\n",
            totals.total, pass_str, fail_str
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:>8}ms\n",
            totals.pass_rate(),
            report.duration_ms().unwrap_or(0)
        ));
        if report.cancelled {
            output.push_str(&format!(
                "║  {}\n",
                self.paint("Run was cancelled before all jobs were dispatched", Color::Yellow, true)
            ));
        }
        if let Some(error) = &report.fatal_error {
            output.push_str(&format!("║  {}\n", self.paint(error, Color::Red, true)));
        }
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_report_brief(&self, report: &RunReport) -> String {
        let totals = report.totals();
        format!(
            "{}: {}/{} passed ({:.1}%){}",
            report.target,
            totals.passed,
            totals.total,
            totals.pass_rate(),
            if report.cancelled { " [cancelled]" } else { "" }
        )
    }

    /// Format a suite tree with rolled-up states
    pub fn format_suite_tree(&self, node: &SuiteNode) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(node).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(node).unwrap_or_default(),
            OutputFormat::Csv => {
                let mut rows = Vec::new();
                flatten(node, &mut rows);
                let mut writer = csv::Writer::from_writer(Vec::new());
                let _ = writer.write_record([
                    "path",
                    "strict",
                    "strict_success",
                    "strict_total",
                    "nonstrict",
                    "nonstrict_success",
                    "nonstrict_total",
                    "excluded",
                ]);
                for n in rows {
                    let _ = writer.write_record([
                        n.path.clone(),
                        n.strict.name().to_string(),
                        n.results.strict.success.to_string(),
                        n.results.strict.total.to_string(),
                        n.nonstrict.name().to_string(),
                        n.results.nonstrict.success.to_string(),
                        n.results.nonstrict.total.to_string(),
                        n.excluded.to_string(),
                    ]);
                }
                into_string(writer)
            }
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::new();
                self.push_tree_lines(node, 0, &mut output);
                output
            }
        }
    }

    fn push_tree_lines(&self, node: &SuiteNode, indent: usize, output: &mut String) {
        let name = if indent == 0 {
            node.path.as_str()
        } else {
            crate::corpus::path::file_name(&node.path)
        };
        output.push_str(&format!(
            "{:indent$}{}/  {}  {}{}\n",
            "",
            name,
            self.suite_cell(RunType::Strict, node),
            self.suite_cell(RunType::NonStrict, node),
            if node.excluded { "  [excluded]" } else { "" },
            indent = indent * 2
        ));
        for child in &node.suites {
            self.push_tree_lines(child, indent + 1, output);
        }
    }

    fn suite_cell(&self, run_type: RunType, node: &SuiteNode) -> String {
        let state = match run_type {
            RunType::Strict => node.strict,
            RunType::NonStrict => node.nonstrict,
        };
        let counts = node.results.get(run_type);
        let text = format!(
            "{}: {} {}/{}",
            run_type.name(),
            state.symbol(),
            counts.success,
            counts.total
        );
        let color = match state {
            SuiteState::Success => Color::Green,
            SuiteState::PartialSuccess => Color::Yellow,
            SuiteState::Failure => Color::Red,
            SuiteState::WillNotRun | SuiteState::HasNotRun => return text,
        };
        self.paint(&text, color, true)
    }

    /// One line per test of a suite with its per-run-type state
    pub fn format_test_states(&self, corpus: &Corpus, suite: &Suite) -> String {
        let mut output = String::new();
        for test in corpus.suite_tests(suite) {
            let cells: Vec<String> = RunType::ALL
                .iter()
                .map(|&run_type| {
                    let state = corpus.test_state(test, run_type);
                    let text = format!("{}: {}", run_type.name(), state.symbol());
                    match state {
                        TestState::Success => self.paint(&text, Color::Green, true),
                        TestState::Failure => self.paint(&text, Color::Red, true),
                        TestState::WillNotRun | TestState::HasNotRun => text,
                    }
                })
                .collect();
            output.push_str(&format!("  {}  {}\n", test.file_name(), cells.join("  ")));
        }
        output
    }

    fn paint(&self, text: &str, color: Color, when: bool) -> String {
        if self.colorize && when {
            format!("\x1b[{}m{text}\x1b[0m", color.code())
        } else {
            text.to_string()
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

#[derive(Clone, Copy)]
enum Color {
    Green,
    Yellow,
    Red,
}

impl Color {
    fn code(self) -> u8 {
        match self {
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Red => 31,
        }
    }
}

fn flatten<'a>(node: &'a SuiteNode, rows: &mut Vec<&'a SuiteNode>) {
    rows.push(node);
    for child in &node.suites {
        flatten(child, rows);
    }
}

fn csv_rows<'a>(results: impl Iterator<Item = &'a TestResult>, header: bool) -> String {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(header)
        .from_writer(Vec::new());
    let mut wrote_any = false;
    for result in results {
        wrote_any = true;
        let _ = writer.serialize(CsvRow::from(result));
    }
    if header && !wrote_any {
        let _ = writer.write_record(["path", "run_type", "success", "duration_ms", "stderr"]);
    }
    into_string(writer).trim_end().to_string()
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> String {
    writer
        .into_inner()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let skip = s.chars().count() - max.saturating_sub(3);
        let tail: String = s.chars().skip(skip).collect();
        format!("...{tail}")
    }
}
