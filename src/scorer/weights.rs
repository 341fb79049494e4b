//! The six independent heuristic ratios.
//!
//! Every function here is total over its documented domain and returns a
//! finite, non-negative ratio; none of them can fail.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use crate::core::config::TypesConfig;
use crate::core::paths;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Ratio returned for filenames containing any non-ASCII character.
pub const NON_ASCII_FILENAME_WEIGHT: f64 = 1.2;

/// Size decay above 4 MiB never goes below this.
pub const SIZE_WEIGHT_FLOOR: f64 = 0.4;

/// Size decay above 4 MiB starts no higher than the 2-4 MiB bucket.
pub const SIZE_WEIGHT_DECAY_CEILING: f64 = 0.7;

/// Extension → ratio lookup, built once from `[types]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeWeights {
    table: BTreeMap<String, f64>,
    default_weight: f64,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self::from_config(&TypesConfig::default())
    }
}

impl TypeWeights {
    #[must_use]
    pub fn from_config(types: &TypesConfig) -> Self {
        Self {
            table: types
                .weights
                .iter()
                .map(|(ext, weight)| (ext.to_ascii_lowercase(), *weight))
                .collect(),
            default_weight: types.default_weight,
        }
    }

    /// Weight for the extension after the last `.`, compared case-insensitively.
    ///
    /// Names without a dot have no extension and get the default.
    #[must_use]
    pub fn weight(&self, filename: &str) -> f64 {
        extension(filename)
            .and_then(|ext| self.table.get(&ext.to_ascii_lowercase()).copied())
            .unwrap_or(self.default_weight)
    }
}

fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// Whole days between `last_modified` and `now`, rounded half-to-even.
///
/// Timestamps in the future clamp to 0 (maximally fresh).
#[must_use]
pub fn days_old(now: i64, last_modified: i64) -> u64 {
    let elapsed = now.saturating_sub(last_modified);
    if elapsed <= 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = (elapsed as f64 / SECONDS_PER_DAY).round_ties_even() as u64;
    days
}

/// Step decay by age bucket: ≤1, ≤3, ≤7, ≤30, ≤90 days, then 180+.
#[must_use]
pub fn freshness_weight(days_old: u64) -> f64 {
    match days_old {
        0..=1 => 1.0,
        2..=3 => 0.9,
        4..=7 => 0.8,
        8..=30 => 0.6,
        31..=90 => 0.4,
        _ => 0.2,
    }
}

/// Non-ASCII names (typically CJK) are favoured.
#[must_use]
pub fn filename_weight(filename: &str) -> f64 {
    if filename.is_ascii() {
        1.0
    } else {
        NON_ASCII_FILENAME_WEIGHT
    }
}

/// Piecewise by kilobytes, then linear decay above 4096 KB clamped to
/// [`SIZE_WEIGHT_FLOOR`, `SIZE_WEIGHT_DECAY_CEILING`].
#[must_use]
pub fn size_weight(size_bytes: u64) -> f64 {
    let kb = size_bytes as f64 / 1024.0;
    if kb <= 512.0 {
        1.0
    } else if kb <= 1024.0 {
        0.9
    } else if kb <= 2048.0 {
        0.8
    } else if kb <= 4096.0 {
        0.7
    } else {
        let decay = (kb - 4096.0) / 4096.0;
        (1.0 - decay).clamp(SIZE_WEIGHT_FLOOR, SIZE_WEIGHT_DECAY_CEILING)
    }
}

/// Stepped by segment count of the canonical path.
#[must_use]
pub fn path_depth_weight(path: &str) -> f64 {
    match paths::segment_count(path) {
        0..=4 => 1.0,
        5..=6 => 0.8,
        7..=8 => 0.5,
        _ => 0.0,
    }
}
