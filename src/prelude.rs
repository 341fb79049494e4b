//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use stalerank::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, StaleRankError};

// Scorer
pub use crate::scorer::engine::{PointBudgets, ScoringEngine, rank};
pub use crate::scorer::folders::{FolderCategory, FolderClassifier};
pub use crate::scorer::record::{FileRecord, ScoreFactors, ScoredItem};
pub use crate::scorer::weights::TypeWeights;

// Dataset
pub use crate::dataset::{LoadedRecords, Strictness, load_records, write_ranked, write_records};

// Export
#[cfg(feature = "sqlite")]
pub use crate::export::{ExportSummary, FsSizeSource, SizeSource, export_all};

// Logging
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter};
