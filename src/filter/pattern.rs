//! Glob matching on file names.

use glob::Pattern;

use super::FileFilter;
use crate::error::{Result, SourceError};
use crate::scanner::FileCandidate;

/// A filter matching file names against a glob pattern.
///
/// Matches the file name only, so `*.txt` accepts text files at any depth.
///
/// # Pattern Syntax
///
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - `[abc]` matches any character in the brackets
/// - `[!abc]` matches any character not in the brackets
#[derive(Debug, Clone)]
pub struct PatternFilter {
    pattern: String,
    compiled: Pattern,
}

impl PatternFilter {
    /// Create a new pattern filter.
    ///
    /// Returns a configuration error if the pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| {
            SourceError::Config(format!("Invalid filename pattern '{pattern}': {e}"))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.compiled.matches(name)
    }

    /// Get the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl FileFilter for PatternFilter {
    fn accept(&self, candidate: &FileCandidate) -> Result<bool> {
        Ok(self.matches_name(&candidate.file_name()))
    }

    fn description(&self) -> String {
        format!("pattern('{}')", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_candidate(path: &str) -> FileCandidate {
        FileCandidate {
            path: PathBuf::from(path),
            relative_path: PathBuf::from(path),
            size: 0,
            modified: None,
        }
    }

    #[test]
    fn test_pattern_matches_file_name_at_any_depth() {
        let filter = PatternFilter::new("*.txt").unwrap();

        assert!(filter.accept(&make_candidate("/in/a.txt")).unwrap());
        assert!(filter.accept(&make_candidate("/in/x/y/b.txt")).unwrap());
        assert!(!filter.accept(&make_candidate("/in/b.log")).unwrap());
        assert!(!filter.accept(&make_candidate("/in/a.txt.gz")).unwrap());
    }

    #[test]
    fn test_pattern_question_mark_and_brackets() {
        let filter = PatternFilter::new("file[0-9]?.csv").unwrap();

        assert!(filter.matches_name("file1a.csv"));
        assert!(!filter.matches_name("fileA1.csv"));
        assert!(!filter.matches_name("file1.csv"));
    }

    #[test]
    fn test_pattern_filter_invalid() {
        let result = PatternFilter::new("[invalid");
        assert!(matches!(result, Err(SourceError::Config(_))));
    }

    #[test]
    fn test_pattern_filter_description() {
        let filter = PatternFilter::new("*.txt").unwrap();
        assert_eq!(filter.pattern(), "*.txt");
        assert_eq!(filter.description(), "pattern('*.txt')");
    }
}
