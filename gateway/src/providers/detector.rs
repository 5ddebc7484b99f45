//! Content detector trait and the regex-based detector.

use regex::{Regex, RegexBuilder};
use safectx_core::McpRequest;

/// Content detector.
///
/// A `true` result denies the request with a content-policy response.
pub trait Detector: Send + Sync {
    /// Whether the request carries disallowed content.
    fn has_violation(&self, request: &McpRequest) -> bool;
}

/// Patterns blocked by [`PatternDetector::default`].
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"drop\s+table",
    r"shutdown",
    r"delete\s+from",
    r"system\s+command",
    r"execute\s+shell",
];

/// Scans the `prompt` parameter against case-insensitive patterns.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<Regex>,
}

impl PatternDetector {
    /// Build a detector from raw patterns, matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if any pattern fails to compile.
    pub fn new<I, P>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl Default for PatternDetector {
    #[allow(clippy::expect_used)] // Constant patterns, covered by tests
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_PATTERNS).expect("default patterns compile")
    }
}

impl Detector for PatternDetector {
    fn has_violation(&self, request: &McpRequest) -> bool {
        request
            .prompt()
            .is_some_and(|prompt| self.patterns.iter().any(|p| p.is_match(prompt)))
    }
}
