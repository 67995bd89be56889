//! Harness include cache
//!
//! Every file under the harness directory is read once at startup and served
//! by file name when test sources are assembled.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Includes prepended to every non-raw test, in this order
pub const BASELINE_INCLUDES: [&str; 3] = ["sta.js", "cth.js", "assert.js"];

/// Include resolution errors
#[derive(Error, Debug)]
pub enum IncludeError {
    #[error("can't fetch include {0}")]
    Unknown(String),

    #[error("can't read harness file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Cached harness files, keyed by file name
#[derive(Clone, Debug, Default)]
pub struct HarnessIncludes {
    cache: HashMap<String, String>,
}

impl HarnessIncludes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file below `dir` into the cache
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, IncludeError> {
        let mut includes = Self::new();
        includes.load_dir(dir.as_ref())?;
        debug!("Loaded {} harness includes", includes.len());
        Ok(includes)
    }

    fn load_dir(&mut self, dir: &Path) -> Result<(), IncludeError> {
        let io_err = |path: &Path, source| IncludeError::Io {
            path: path.display().to_string(),
            source,
        };

        let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                self.load_dir(&path)?;
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                self.cache.insert(name.to_string(), content);
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.cache.insert(name.into(), content.into());
    }

    pub fn with(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    /// Look up an include by file name
    pub fn fetch(&self, name: &str) -> Result<&str, IncludeError> {
        self.cache
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| IncludeError::Unknown(name.to_string()))
    }

    /// Check that every named include is cached
    pub fn verify<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<(), IncludeError> {
        for name in names {
            self.fetch(name)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
