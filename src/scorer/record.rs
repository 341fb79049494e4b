//! Input records and ranked output items.

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, StaleRankError};

/// One indexed file as produced by the exporter.
///
/// Fields are private so that every instance has passed [`FileRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFileRecord")]
pub struct FileRecord {
    filename: String,
    path: String,
    size: u64,
    last_modified: i64,
}

/// Unvalidated wire shape; `size` is signed so negative sizes reach validation
/// instead of failing as an opaque type error.
#[derive(Debug, Deserialize)]
struct RawFileRecord {
    filename: String,
    path: String,
    size: i64,
    last_modified: i64,
}

impl TryFrom<RawFileRecord> for FileRecord {
    type Error = String;

    fn try_from(raw: RawFileRecord) -> std::result::Result<Self, Self::Error> {
        let size = u64::try_from(raw.size)
            .map_err(|_| format!("size must be non-negative, got {}", raw.size))?;
        Self::validated(raw.filename, raw.path, size, raw.last_modified)
    }
}

impl FileRecord {
    /// Build a record, rejecting empty names and paths.
    pub fn new(
        filename: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        last_modified: i64,
    ) -> Result<Self> {
        Self::validated(filename.into(), path.into(), size, last_modified)
            .map_err(|reason| StaleRankError::MalformedRecord { index: 0, reason })
    }

    fn validated(
        filename: String,
        path: String,
        size: u64,
        last_modified: i64,
    ) -> std::result::Result<Self, String> {
        if filename.trim().is_empty() {
            return Err("filename must not be empty".to_string());
        }
        if path.trim().is_empty() {
            return Err("path must not be empty".to_string());
        }
        Ok(Self {
            filename,
            path,
            size,
            last_modified,
        })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Unix seconds.
    #[must_use]
    pub const fn last_modified(&self) -> i64 {
        self.last_modified
    }
}

/// Individual heuristic ratios behind one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub file_type: f64,
    pub freshness: f64,
    pub filename: f64,
    pub size: f64,
    pub depth: f64,
    pub folder: f64,
}

/// Ranked output element. Lower score sorts first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub path: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub factors: Option<ScoreFactors>,
}

impl ScoredItem {
    /// Drop the factor breakdown, leaving the plain `{path, score}` form.
    #[must_use]
    pub fn without_factors(self) -> Self {
        Self {
            factors: None,
            ..self
        }
    }
}
