//! Exclusion registry
//!
//! A sorted list of path prefixes that are kept out of scheduling and out of
//! pass/fail rollups. Suite entries carry a trailing `/` so that `built-ins/Array/`
//! does not also swallow `built-ins/ArrayBuffer`. The list is rewritten in full
//! after every change.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default file name of the persisted list
pub const DEFAULT_EXPECTATIONS_FILE: &str = "TestExpectations";

/// Exclusion registry errors
#[derive(Error, Debug)]
pub enum ExclusionError {
    #[error("can't read expectations {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't write expectations {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exclusion entry {0:?}: entries must be non-empty and contain no whitespace")]
    InvalidEntry(String),
}

/// Registry entry for a suite directory
pub fn suite_entry(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

/// Set of excluded path prefixes, optionally backed by a file
#[derive(Clone, Debug, Default)]
pub struct ExclusionRegistry {
    entries: Vec<String>,
    store: Option<PathBuf>,
}

impl ExclusionRegistry {
    /// Registry that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the registry from `path`; a missing file is an empty registry
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExclusionError> {
        let path = path.as_ref();
        let mut registry = Self {
            entries: Vec::new(),
            store: Some(path.to_path_buf()),
        };

        match fs::read_to_string(path) {
            Ok(content) => {
                registry.entries = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                debug!(
                    "Loaded {} exclusions from {}",
                    registry.entries.len(),
                    path.display()
                );
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Can't read expectations {} (this might be OK): {}",
                    path.display(),
                    e
                );
            }
            Err(source) => {
                return Err(ExclusionError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        }

        Ok(registry)
    }

    /// True if `path` equals or starts with any entry
    pub fn is_excluded(&self, path: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| path == entry || path.starts_with(entry.as_str()))
    }

    /// Add or remove an exact entry and persist the result
    pub fn set_excluded(&mut self, entry: &str, excluded: bool) -> Result<(), ExclusionError> {
        if entry.is_empty() || entry.chars().any(char::is_whitespace) {
            return Err(ExclusionError::InvalidEntry(entry.to_string()));
        }

        self.entries.retain(|e| e != entry);
        if excluded {
            self.entries.push(entry.to_string());
            info!("Excluded {}", entry);
        } else {
            info!("Included {}", entry);
        }

        self.persist()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn persist(&mut self) -> Result<(), ExclusionError> {
        self.entries.sort();
        self.entries.dedup();

        let Some(path) = &self.store else {
            return Ok(());
        };

        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }

        fs::write(path, content).map_err(|source| ExclusionError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}
