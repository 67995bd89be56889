//! Logging utilities
//!
//! Provides logging configuration and helpers.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Filter directive for `level`, unless `directive` overrides it
fn filter_directive(level: LogLevel, directive: Option<&str>) -> String {
    match directive.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => match LogLevel::from_str(d) {
            Some(level) => format!("conformance_runner={}", level.to_tracing_level()),
            None => d.to_string(),
        },
        None => format!("conformance_runner={}", level.to_tracing_level()),
    }
}

/// Initialize the logger with specified level. `directive`, usually taken
/// from `CONFORMANCE_RUNNER_LOG`, replaces the level when set.
pub fn init_logger(level: LogLevel, directive: Option<&str>) {
    let filter = EnvFilter::new(filter_directive(level, directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("unknown"), None);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Info, None), "conformance_runner=INFO");
        assert_eq!(
            filter_directive(LogLevel::Info, Some("trace")),
            "conformance_runner=TRACE"
        );
        assert_eq!(
            filter_directive(LogLevel::Debug, Some("conformance_runner::executor=trace")),
            "conformance_runner::executor=trace"
        );
        assert_eq!(filter_directive(LogLevel::Warn, Some("  ")), "conformance_runner=WARN");
    }
}
