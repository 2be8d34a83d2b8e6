//! Glob-based exclusion patterns and ignore-file rules.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::Path;

/// A single exclude rule: a glob evaluated against a `/`-normalized
/// root-relative path, anchored at both ends.
///
/// `**` matches any sequence including `/`, `*` any sequence excluding
/// `/`, and `?` exactly one character excluding `/`. Everything else is
/// literal.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compiles a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid glob.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let glob = GlobBuilder::new(&text)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::pattern(&text, e.to_string()))?;

        Ok(Self {
            matcher: glob.compile_matcher(),
            text,
        })
    }

    /// Returns the original pattern text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Matches the pattern against a root-relative path.
    ///
    /// Paths with `\` separators are normalized to `/` first.
    #[must_use]
    pub fn matches(&self, relative_path: &str) -> bool {
        if relative_path.contains('\\') {
            let normalized = relative_path.replace('\\', "/");
            return self.matcher.is_match(Path::new(&normalized));
        }
        self.matcher.is_match(Path::new(relative_path))
    }
}

/// Ordered exclusion rules loaded from a repository's ignore file.
///
/// Rules are evaluated in file order with first match winning. Negation
/// (`!` re-inclusion) and directory-only anchors are not supported; a
/// line starting with `!` is compiled as ordinary pattern text.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    rules: Vec<Pattern>,
}

impl IgnoreRuleSet {
    /// Loads `<root>/.gitignore` when present.
    ///
    /// Blank lines and `#` comment lines are skipped; unparseable
    /// patterns are dropped with a warning rather than failing the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the ignore file exists but cannot be read.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(".gitignore");
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let mut rules = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Pattern::new(line) {
                Ok(pattern) => rules.push(pattern),
                Err(e) => tracing::warn!("Skipping unparseable ignore rule: {}", e),
            }
        }

        tracing::debug!("Loaded {} ignore rules from {}", rules.len(), path.display());
        Ok(Self { rules })
    }

    /// Returns true if any rule matches the given relative path.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(relative_path))
    }

    /// Number of loaded rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compiles a list of exclude pattern strings.
///
/// # Errors
///
/// Returns an error for the first invalid pattern.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(Pattern::new).collect()
}
