//! Filesystem discovery of a corpus

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{path, Corpus, CorpusError};
use crate::exclusions::ExclusionRegistry;
use crate::harness::HarnessIncludes;
use crate::metadata::parse_test_file;

/// A discovered path, directory or test file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusEntry {
    pub path: String,
    pub is_dir: bool,
}

impl CorpusEntry {
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }
}

/// Walk `root` depth first, yielding each directory before anything in it.
/// Only `.js` files are tests; `_FIXTURE` modules are support files.
pub fn discover(root: &str) -> Result<Vec<CorpusEntry>, CorpusError> {
    let root = path::normalize(root);
    let mut entries = vec![CorpusEntry::dir(root.clone())];
    walk(&root, &mut entries)?;
    debug!("Discovered {} entries under {}", entries.len(), root);
    Ok(entries)
}

fn walk(dir: &str, entries: &mut Vec<CorpusEntry>) -> Result<(), CorpusError> {
    let io_err = |source| CorpusError::Io {
        path: dir.to_string(),
        source,
    };

    let mut children: Vec<(String, bool)> = Vec::new();
    for entry in fs::read_dir(Path::new(dir)).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_dir = entry.file_type().map_err(io_err)?.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        children.push((name, is_dir));
    }
    children.sort();

    for (name, is_dir) in children {
        let child = path::join(dir, &name);
        if is_dir {
            entries.push(CorpusEntry::dir(child.clone()));
            walk(&child, entries)?;
        } else if is_test_file(&name) {
            entries.push(CorpusEntry::file(child));
        }
    }

    Ok(())
}

fn is_test_file(name: &str) -> bool {
    name.ends_with(".js") && !name.contains("_FIXTURE")
}

/// Discover, parse and link the corpus at `root`. Fails on the first
/// unreadable file, malformed metadata block or unknown include.
pub fn load_corpus(
    root: &str,
    includes: &HarnessIncludes,
    exclusions: ExclusionRegistry,
) -> Result<Corpus, CorpusError> {
    let entries = discover(root)?;

    let corpus = Corpus::build(root, entries, exclusions, |file| {
        let contents = fs::read_to_string(file).map_err(|source| CorpusError::Io {
            path: file.to_string(),
            source,
        })?;
        let parsed = parse_test_file(&contents).map_err(|source| CorpusError::Metadata {
            path: file.to_string(),
            source,
        })?;
        includes
            .verify(&parsed.metadata.includes)
            .map_err(|source| CorpusError::Include {
                path: file.to_string(),
                source,
            })?;
        Ok(parsed)
    })?;

    info!(
        "Loaded {} tests in {} suites from {}",
        corpus.test_count(),
        corpus.suite_count(),
        corpus.root_path()
    );
    Ok(corpus)
}
