//! Scoring engine: record model, heuristic weights, folder globs, additive ranking.

pub mod engine;
pub mod folders;
pub mod record;
pub mod weights;
