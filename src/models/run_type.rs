//! Execution modes a test can be run in

use serde::{Deserialize, Serialize};
use std::fmt;

/// Evaluation mode for a single run of a test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Strict,
    NonStrict,
}

impl RunType {
    /// Both run types, strict first
    pub const ALL: [RunType; 2] = [RunType::Strict, RunType::NonStrict];

    pub fn name(&self) -> &'static str {
        match self {
            RunType::Strict => "strict",
            RunType::NonStrict => "nonstrict",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(RunType::Strict),
            "nonstrict" | "non-strict" | "sloppy" => Some(RunType::NonStrict),
            _ => None,
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_type_from_str() {
        assert_eq!(RunType::from_str("strict"), Some(RunType::Strict));
        assert_eq!(RunType::from_str("NonStrict"), Some(RunType::NonStrict));
        assert_eq!(RunType::from_str("module"), None);
    }

    #[test]
    fn test_run_type_serde_names() {
        let json = serde_json::to_string(&RunType::ALL).unwrap();
        assert_eq!(json, r#"["strict","nonstrict"]"#);
    }
}
