//! Additive combination of the six heuristic ratios and the ascending ranking.
//!
//! Each ratio is scaled by its point budget (1000 points in total), the
//! contributions are summed and the sum is inverted: `score = 1000 - sum`.
//! A file that every heuristic favours therefore ends up near 0 and sorts
//! first. The non-ASCII filename ratio exceeds 1.0, so the best-placed files
//! score slightly below 0; the value is kept as is so that ordering among them
//! still follows the other heuristics.

#![allow(missing_docs)]

use std::cmp::Ordering;
use std::thread;

use crossbeam_channel as channel;

use crate::core::config::{Config, ScoringConfig, TOTAL_POINT_BUDGET};
use crate::core::errors::Result;
use crate::scorer::folders::FolderClassifier;
use crate::scorer::record::{FileRecord, ScoreFactors, ScoredItem};
use crate::scorer::weights::{self, TypeWeights};

/// Point budget per heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointBudgets {
    pub file_type: f64,
    pub freshness: f64,
    pub filename: f64,
    pub size: f64,
    pub depth: f64,
    pub folder: f64,
}

impl From<&ScoringConfig> for PointBudgets {
    fn from(scoring: &ScoringConfig) -> Self {
        Self {
            file_type: scoring.type_points,
            freshness: scoring.freshness_points,
            filename: scoring.filename_points,
            size: scoring.size_points,
            depth: scoring.depth_points,
            folder: scoring.folder_points,
        }
    }
}

impl Default for PointBudgets {
    fn default() -> Self {
        Self::from(&ScoringConfig::default())
    }
}

impl PointBudgets {
    /// Sum of budget × ratio over all six heuristics.
    #[must_use]
    pub fn points(&self, factors: &ScoreFactors) -> f64 {
        self.folder.mul_add(
            factors.folder,
            self.depth.mul_add(
                factors.depth,
                self.size.mul_add(
                    factors.size,
                    self.filename.mul_add(
                        factors.filename,
                        self.freshness
                            .mul_add(factors.freshness, self.file_type * factors.file_type),
                    ),
                ),
            ),
        )
    }
}

/// Deterministic batch scorer.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    budgets: PointBudgets,
    types: TypeWeights,
    folders: FolderClassifier,
    parallelism: usize,
}

impl ScoringEngine {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            budgets: PointBudgets::from(&config.scoring),
            types: TypeWeights::from_config(&config.types),
            folders: FolderClassifier::from_config(&config.folders)?,
            parallelism: config.runtime.parallelism.max(1),
        })
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// The six ratios for one record, evaluated against `now` (Unix seconds).
    #[must_use]
    pub fn factors(&self, record: &FileRecord, now: i64) -> ScoreFactors {
        ScoreFactors {
            file_type: self.types.weight(record.filename()),
            freshness: weights::freshness_weight(weights::days_old(now, record.last_modified())),
            filename: weights::filename_weight(record.filename()),
            size: weights::size_weight(record.size()),
            depth: weights::path_depth_weight(record.path()),
            folder: self.folders.weight(record.path()),
        }
    }

    /// Score one record. Lower is higher priority.
    #[must_use]
    pub fn score_record(&self, record: &FileRecord, now: i64) -> ScoredItem {
        let factors = self.factors(record, now);
        let score = TOTAL_POINT_BUDGET - self.budgets.points(&factors);
        ScoredItem {
            path: record.path().to_string(),
            score,
            factors: Some(factors),
        }
    }

    /// Score every record against one shared `now`, then rank ascending.
    ///
    /// Ties keep input order, and the result does not depend on parallelism.
    #[must_use]
    pub fn score_batch(&self, records: &[FileRecord], now: i64) -> Vec<ScoredItem> {
        let mut scored = if self.parallelism <= 1 || records.len() < 2 {
            records
                .iter()
                .map(|record| self.score_record(record, now))
                .collect()
        } else {
            self.score_parallel(records, now)
        };
        rank(&mut scored);
        scored
    }

    fn score_parallel(&self, records: &[FileRecord], now: i64) -> Vec<ScoredItem> {
        let chunk_size = records.len().div_ceil(self.parallelism);
        let chunk_count = records.len().div_ceil(chunk_size);
        let (result_tx, result_rx) = channel::bounded::<(usize, Vec<ScoredItem>)>(chunk_count);

        let mut chunks = thread::scope(|scope| {
            for (index, chunk) in records.chunks(chunk_size).enumerate() {
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    let scored = chunk
                        .iter()
                        .map(|record| self.score_record(record, now))
                        .collect::<Vec<_>>();
                    let _ = result_tx.send((index, scored));
                });
            }
            drop(result_tx);
            result_rx.iter().collect::<Vec<_>>()
        });

        chunks.sort_by_key(|(index, _)| *index);
        chunks.into_iter().flat_map(|(_, scored)| scored).collect()
    }
}

/// Stable ascending sort by score.
pub fn rank(items: &mut [ScoredItem]) {
    items.sort_by(|left, right| {
        left.score
            .partial_cmp(&right.score)
            .unwrap_or(Ordering::Equal)
    });
}
