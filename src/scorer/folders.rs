//! Folder-category classification: ordered recursive-glob lists compiled to regexes.

#![allow(missing_docs)]

use regex::{Regex, RegexBuilder};

use crate::core::config::FoldersConfig;
use crate::core::errors::{Result, StaleRankError};
use crate::core::paths;

/// Category a path falls into after glob matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderCategory {
    High,
    Low,
    Neutral,
}

impl FolderCategory {
    /// Ratio contributed by this category.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Low => 0.2,
            Self::Neutral => 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledGlob {
    source: String,
    regex: Regex,
}

/// High- and low-priority glob lists, compiled once.
#[derive(Debug, Clone)]
pub struct FolderClassifier {
    high: Vec<CompiledGlob>,
    low: Vec<CompiledGlob>,
}

impl FolderClassifier {
    pub fn from_config(folders: &FoldersConfig) -> Result<Self> {
        let compile_all = |patterns: &[String]| -> Result<Vec<CompiledGlob>> {
            patterns
                .iter()
                .map(|pattern| {
                    Ok(CompiledGlob {
                        source: pattern.clone(),
                        regex: glob_to_regex(pattern, folders.case_insensitive)?,
                    })
                })
                .collect()
        };
        Ok(Self {
            high: compile_all(&folders.high_priority_globs)?,
            low: compile_all(&folders.low_priority_globs)?,
        })
    }

    /// High list first, then low list; first match wins.
    #[must_use]
    pub fn classify(&self, path: &str) -> FolderCategory {
        self.matching_pattern(path)
            .map_or(FolderCategory::Neutral, |(category, _)| category)
    }

    /// Category plus the glob that produced it.
    #[must_use]
    pub fn matching_pattern(&self, path: &str) -> Option<(FolderCategory, &str)> {
        let canonical = paths::to_canonical(path);
        first_match(&self.high, &canonical)
            .map(|source| (FolderCategory::High, source))
            .or_else(|| {
                first_match(&self.low, &canonical).map(|source| (FolderCategory::Low, source))
            })
    }

    #[must_use]
    pub fn weight(&self, path: &str) -> f64 {
        self.classify(path).weight()
    }
}

fn first_match<'a>(globs: &'a [CompiledGlob], canonical: &str) -> Option<&'a str> {
    globs
        .iter()
        .find(|glob| glob.regex.is_match(canonical))
        .map(|glob| glob.source.as_str())
}

/// Validate that a glob pattern can be compiled.
pub fn validate_glob_pattern(pattern: &str) -> Result<()> {
    glob_to_regex(pattern, false).map(|_| ())
}

/// Convert a shell-style glob pattern to an anchored regex.
///
/// Supports:
/// - `**/` → zero or more whole leading segments
/// - `**`  → anything, including separators
/// - `*`   → anything except `/`
/// - `?`   → a single character except `/`
///
/// Backslashes in the pattern are separators, like in paths.
fn glob_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    if pattern.trim().is_empty() {
        return Err(StaleRankError::InvalidConfig {
            details: "empty glob pattern".to_string(),
        });
    }

    let normalized = paths::to_canonical(pattern);
    let chars: Vec<char> = normalized.chars().collect();
    let mut regex_str = String::with_capacity(pattern.len() * 2);
    regex_str.push('^');

    let mut i = 0;
    let mut buf = [0u8; 4];
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c => {
                regex_str.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }
    regex_str.push('$');

    RegexBuilder::new(&regex_str)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|err| StaleRankError::InvalidConfig {
            details: format!("invalid glob pattern {pattern:?}: {err}"),
        })
}
