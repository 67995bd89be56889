//! Script engine execution
//!
//! The [`Executor`] trait is the seam between the scheduler and whatever
//! actually runs a test. [`ProcessExecutor`] runs an external engine binary.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Failures to run the engine at all. These are fatal to a run; a test that
/// ran and failed is reported through [`Execution::success`] instead.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("can't launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't prepare source file: {0}")]
    SourceFile(#[source] std::io::Error),

    #[error("can't collect output of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured outcome of one engine run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub success: bool,
    pub stderr: String,
    pub stdout: String,
    pub elapsed: Duration,
}

/// Runs fully assembled source text
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        source: &str,
        timeout: Option<Duration>,
    ) -> Result<Execution, ExecutorError>;
}

/// Executes sources by writing them to a temporary file and running
/// `program [args...] <file>`
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    program: PathBuf,
    args: Vec<String>,
    default_timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            default_timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Timeout for tests that do not declare their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(
        &self,
        source: &str,
        timeout: Option<Duration>,
    ) -> Result<Execution, ExecutorError> {
        let mut file = tempfile::Builder::new()
            .prefix("conformance-")
            .suffix(".js")
            .tempfile()
            .map_err(ExecutorError::SourceFile)?;
        file.write_all(source.as_bytes())
            .and_then(|_| file.flush())
            .map_err(ExecutorError::SourceFile)?;

        let start = Instant::now();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Launch {
                program: self.program_name(),
                source,
            })?;

        let wait = child.wait_with_output();
        let output = match timeout.or(self.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(output) => output,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    warn!("{} timed out after {}ms", file.path().display(), limit.as_millis());
                    return Ok(Execution {
                        success: false,
                        stderr: format!("timed out after {}ms", limit.as_millis()),
                        stdout: String::new(),
                        elapsed: start.elapsed(),
                    });
                }
            },
            None => wait.await,
        }
        .map_err(|source| ExecutorError::Wait {
            program: self.program_name(),
            source,
        })?;

        let elapsed = start.elapsed();
        debug!(
            "{} exited with {} in {}ms",
            self.program.display(),
            output.status,
            elapsed.as_millis()
        );

        Ok(Execution {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            elapsed,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell() -> ProcessExecutor {
        ProcessExecutor::new("sh")
    }

    #[tokio::test]
    async fn test_successful_run() {
        let execution = shell().execute("echo hello", None).await.unwrap();
        assert!(execution.success);
        assert_eq!(execution.stdout, "hello\n");
        assert!(execution.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_is_not_an_error() {
        let execution = shell()
            .execute("echo out; echo err >&2; exit 3", None)
            .await
            .unwrap();
        assert!(!execution.success);
        assert_eq!(execution.stdout, "out\n");
        assert_eq!(execution.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_timeout_fails_the_test() {
        let execution = shell()
            .execute("sleep 5", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(!execution.success);
        assert!(execution.stderr.contains("timed out"));
        assert!(execution.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_default_timeout() {
        let executor = shell().with_default_timeout(Some(Duration::from_millis(100)));
        let execution = executor.execute("sleep 5", None).await.unwrap();
        assert!(!execution.success);
    }

    #[tokio::test]
    async fn test_launch_failure_is_an_error() {
        let executor = ProcessExecutor::new("/nonexistent/engine/binary");
        let err = executor.execute("1;", None).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_args_are_passed_before_file() {
        let executor = ProcessExecutor::new("sh").with_args(vec!["-e".to_string()]);
        let execution = executor.execute("false; echo unreachable", None).await.unwrap();
        assert!(!execution.success);
        assert!(execution.stdout.is_empty());
    }
}
