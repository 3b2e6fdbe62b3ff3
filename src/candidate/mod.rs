//! Placement candidates and their pruning.
//!
//! A candidate is one pattern placement whose sum of absolute differences
//! stayed within budget. Within a scan every candidate covers the same number
//! of samples, so ordering by SAD is ordering by similarity.

use std::cmp::Ordering;

pub(crate) mod nms;

/// Placement in view coordinates with its sum of absolute differences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// X coordinate (column) of the pattern's top-left corner.
    pub x: usize,
    /// Y coordinate (row) of the pattern's top-left corner.
    pub y: usize,
    /// Sum of absolute per-channel differences.
    pub sad: u64,
}

fn candidate_cmp(a: &Candidate, b: &Candidate) -> Ordering {
    a.sad
        .cmp(&b.sad)
        .then_with(|| a.y.cmp(&b.y))
        .then_with(|| a.x.cmp(&b.x))
}

/// Sorts best first with deterministic tie-breaking (row, then column).
pub(crate) fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_unstable_by(candidate_cmp);
}
