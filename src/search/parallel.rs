//! Rayon row-parallel scan (feature-gated).
//!
//! Rows of placements are distributed across threads; each row checks the
//! search control before it starts. Row results are concatenated in row
//! order, so the output is identical to the sequential scan.

use crate::candidate::Candidate;
use crate::image::RgbView;
use crate::search::control::SearchControl;
use crate::search::scan::{pattern_samples, placement_range, scan_row};
use crate::util::math::sad_budget;
use crate::util::MatchResult;
use rayon::prelude::*;

/// Row-parallel counterpart of [`scan_sad`](crate::search::scan::scan_sad).
pub fn scan_sad_par(
    image: RgbView<'_>,
    pattern: RgbView<'_>,
    min_similarity: f32,
    control: &SearchControl,
) -> MatchResult<Vec<Candidate>> {
    let Some((max_x, max_y)) = placement_range(image, pattern) else {
        return Ok(Vec::new());
    };
    let budget = sad_budget(min_similarity, pattern_samples(pattern));

    let rows: Vec<Vec<Candidate>> = (0..=max_y)
        .into_par_iter()
        .map(|y| -> MatchResult<Vec<Candidate>> {
            control.check()?;
            let mut row = Vec::new();
            scan_row(image, pattern, y, max_x, budget, min_similarity, &mut row);
            Ok(row)
        })
        .collect::<MatchResult<_>>()?;

    Ok(rows.into_iter().flatten().collect())
}
