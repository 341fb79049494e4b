#![forbid(unsafe_code)]

//! stalerank: heuristic priority ranking for indexed files.
//!
//! Each file record is rated by six independent heuristics (extension,
//! freshness, filename charset, size, path depth and folder category). The
//! ratios are combined into one score of at most 1000 where lower means
//! higher priority, and the batch is stable-sorted ascending.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use stalerank::prelude::*;
//!
//! let config = Config::load(None)?;
//! let engine = ScoringEngine::from_config(&config)?;
//! let loaded = load_records(&config.paths.input_path, Strictness::Lenient)?;
//! let ranked = engine.score_batch(&loaded.records, 1_700_000_000);
//! # Ok::<(), StaleRankError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod dataset;
#[cfg(feature = "sqlite")]
pub mod export;
pub mod logger;
pub mod scorer;
