//! SRK-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, StaleRankError>;

/// Top-level error type for stalerank.
#[derive(Debug, Error)]
pub enum StaleRankError {
    #[error("[SRK-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SRK-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SRK-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SRK-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SRK-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[SRK-2201] malformed record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("[SRK-2202] unresolvable index entry {id} in {table}: {reason}")]
    IndexEntry {
        table: String,
        id: String,
        reason: String,
    },

    #[error("[SRK-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StaleRankError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SRK-1001",
            Self::MissingConfig { .. } => "SRK-1002",
            Self::ConfigParse { .. } => "SRK-1003",
            Self::Serialization { .. } => "SRK-2101",
            Self::Sql { .. } => "SRK-2102",
            Self::MalformedRecord { .. } => "SRK-2201",
            Self::IndexEntry { .. } => "SRK-2202",
            Self::Io { .. } => "SRK-3002",
        }
    }

    /// Whether the failure is local to one input item and the batch can continue.
    #[must_use]
    pub const fn is_record_local(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. } | Self::IndexEntry { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StaleRankError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for StaleRankError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for StaleRankError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
