pub mod error;
pub mod novel;

pub use error::{ErrorCategory, ErrorClassifier, LlmError, NovelError, Result, ResultExt};
pub use novel::{
    Chapter, ChapterOutline, CostInfo, DetailedOutline, Intent, Novel, Outline, OutlineKind,
    RoughOutline, Volume,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Number of description characters that prefix a run id
const RUN_ID_PREFIX_CHARS: usize = 5;

/// Type-safe wrapper for generation run IDs
///
/// A run id names the run's directory under the workspace, so it is
/// always a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build `<first 5 chars of description>_<YYYYmmdd_HHMMSS>`
    pub fn generate(description: &str, at: DateTime<Local>) -> Self {
        let prefix: String = description
            .trim()
            .chars()
            .take(RUN_ID_PREFIX_CHARS)
            .map(|c| {
                if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '.') {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        Self(format!("{}_{}", prefix, at.format("%Y%m%d_%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
