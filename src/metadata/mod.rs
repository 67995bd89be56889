//! Test file metadata
//!
//! Splits a test file into its comment header, the YAML front-matter block
//! and the test body, and validates the declared flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Run only in strict mode
pub const ONLY_STRICT_FLAG: &str = "onlyStrict";
/// Run only in non-strict mode
pub const NO_STRICT_FLAG: &str = "noStrict";
/// Run the body verbatim, without preamble or includes
pub const RAW_FLAG: &str = "raw";

/// Metadata parsing errors
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata comment has no YAML block (legacy @attribute format is not supported)")]
    MissingYaml,

    #[error("malformed YAML metadata: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid test: {0}")]
    Invalid(String),
}

/// Phase in which a negative test is expected to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativePhase {
    Early,
    Runtime,
}

/// Expected failure of a negative test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negative {
    pub phase: Option<NegativePhase>,
    /// Expected error constructor name
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Declarative metadata attached to a test
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestMetadata {
    pub description: String,
    pub info: String,
    pub negative: Option<Negative>,
    pub esid: String,
    pub es6id: String,
    pub es5id: String,
    pub includes: Vec<String>,
    /// Timeout in milliseconds
    pub timeout: Option<u64>,
    pub author: String,
    pub flags: Vec<String>,
    pub features: Vec<String>,
}

impl TestMetadata {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_strict_only(&self) -> bool {
        self.has_flag(ONLY_STRICT_FLAG)
    }

    pub fn is_non_strict_only(&self) -> bool {
        self.has_flag(NO_STRICT_FLAG)
    }

    pub fn is_raw(&self) -> bool {
        self.has_flag(RAW_FLAG)
    }

    pub fn negative_phase(&self) -> Option<NegativePhase> {
        self.negative.as_ref().and_then(|n| n.phase)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
            .as_ref()
            .map(|n| n.phase.is_some() || !n.kind.is_empty())
            .unwrap_or(false)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }

    /// Check flag combinations that cannot be honoured together
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.is_strict_only() && self.is_non_strict_only() {
            return Err(MetadataError::Invalid(format!(
                "can't be both {ONLY_STRICT_FLAG} and {NO_STRICT_FLAG}"
            )));
        }

        if self.is_raw() {
            if self.is_strict_only() || self.is_non_strict_only() {
                return Err(MetadataError::Invalid(
                    "can't be raw and strict or nonStrict".to_string(),
                ));
            }
            if !self.includes.is_empty() {
                return Err(MetadataError::Invalid(
                    "can't be raw and have includes".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// A test file split into metadata and body
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedTest {
    pub metadata: TestMetadata,
    pub body: String,
}

/// Parse and validate the contents of a test file
pub fn parse_test_file(contents: &str) -> Result<ParsedTest, MetadataError> {
    let header_end = header_len(contents);
    let rest = &contents[header_end..];

    let (metadata, body) = match split_comment(rest) {
        Some((attrs, body)) if !attrs.trim().is_empty() => (parse_yaml_attrs(attrs)?, body),
        Some((_, body)) => (TestMetadata::default(), body),
        None => (TestMetadata::default(), rest),
    };

    metadata.validate()?;

    Ok(ParsedTest {
        metadata,
        body: body.to_string(),
    })
}

/// Length of the leading run of blank and `//` comment lines
fn header_len(src: &str) -> usize {
    let mut pos = 0;
    while let Some(nl) = src[pos..].find('\n') {
        let line = src[pos..pos + nl].trim();
        if !line.is_empty() && !line.starts_with("//") {
            break;
        }
        pos += nl + 1;
    }
    pos
}

/// Split a leading `/* ... */` comment from the text after it.
///
/// The comment only counts when it is followed by a line break; the body
/// starts after the last line break in the whitespace that follows it.
fn split_comment(src: &str) -> Option<(&str, &str)> {
    let start = src.trim_start_matches([' ', '\t']);
    let inner_start = start.strip_prefix("/*")?;
    let inner_start = inner_start.strip_prefix('*').unwrap_or(inner_start);
    let close = inner_start.find("*/")?;
    let attrs = &inner_start[..close];

    let after = &inner_start[close + 2..];
    let ws_len = after.len() - after.trim_start().len();
    let last_nl = after[..ws_len].rfind('\n')?;

    Some((attrs, &after[last_nl + 1..]))
}

fn parse_yaml_attrs(attrs: &str) -> Result<TestMetadata, MetadataError> {
    let first = attrs.find("---").ok_or(MetadataError::MissingYaml)?;
    let last = attrs.rfind("---").ok_or(MetadataError::MissingYaml)?;
    if last <= first {
        return Err(MetadataError::MissingYaml);
    }

    let yaml = &attrs[first + 3..last];
    if yaml.trim().is_empty() {
        return Ok(TestMetadata::default());
    }

    Ok(serde_yaml::from_str(yaml)?)
}
