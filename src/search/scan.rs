//! Dense scan over search regions.
//!
//! Similarity is `1 - SAD / (255 * 3 * pixels)`: the mean absolute
//! per-channel difference mapped to `[0, 1]`. Sums are accumulated in integers,
//! so repeated scans of the same inputs give bit-identical scores. A placement
//! is abandoned as soon as its running SAD exceeds what the threshold allows.

use crate::candidate::Candidate;
use crate::image::{Image, RgbView};
use crate::search::control::SearchControl;
use crate::util::math::{sad_budget, similarity_from_sad};
use crate::util::{MatchError, MatchResult};

/// Channel samples covered by one placement of `pattern`.
pub(crate) fn pattern_samples(pattern: RgbView<'_>) -> u64 {
    pattern.width() as u64 * pattern.height() as u64 * 3
}

/// Scans every placement of `pattern` inside `image` and returns those scoring
/// at least `min_similarity`, unordered, in `image` coordinates.
///
/// A pattern larger than `image` has no placements and yields an empty list.
pub fn scan_sad(
    image: RgbView<'_>,
    pattern: RgbView<'_>,
    min_similarity: f32,
    control: &SearchControl,
) -> MatchResult<Vec<Candidate>> {
    let Some((max_x, max_y)) = placement_range(image, pattern) else {
        return Ok(Vec::new());
    };
    let budget = sad_budget(min_similarity, pattern_samples(pattern));

    let mut out = Vec::new();
    for y in 0..=max_y {
        control.check()?;
        scan_row(image, pattern, y, max_x, budget, min_similarity, &mut out);
    }
    Ok(out)
}

/// Last valid top-left placement, or `None` if the pattern does not fit.
pub(crate) fn placement_range(image: RgbView<'_>, pattern: RgbView<'_>) -> Option<(usize, usize)> {
    if pattern.width() > image.width() || pattern.height() > image.height() {
        return None;
    }
    Some((
        image.width() - pattern.width(),
        image.height() - pattern.height(),
    ))
}

pub(crate) fn scan_row(
    image: RgbView<'_>,
    pattern: RgbView<'_>,
    y: usize,
    max_x: usize,
    budget: u64,
    min_similarity: f32,
    out: &mut Vec<Candidate>,
) {
    let samples = pattern_samples(pattern);
    for x in 0..=max_x {
        if let Some(sad) = sad_at(image, pattern, x, y, budget) {
            if similarity_from_sad(sad, samples) >= min_similarity {
                out.push(Candidate { x, y, sad });
            }
        }
    }
}

/// SAD of the placement at `(x, y)`, or `None` once it exceeds `budget`.
fn sad_at(image: RgbView<'_>, pattern: RgbView<'_>, x: usize, y: usize, budget: u64) -> Option<u64> {
    let width = pattern.width();
    let mut sad = 0u64;
    for ty in 0..pattern.height() {
        let img_row = &image.row(y + ty).expect("row within bounds for scan")[x..x + width];
        let tpl_row = pattern.row(ty).expect("pattern row within bounds");
        let mut row_sad = 0u32;
        for (a, b) in img_row.iter().zip(tpl_row) {
            row_sad += u32::from(a[0].abs_diff(b[0]))
                + u32::from(a[1].abs_diff(b[1]))
                + u32::from(a[2].abs_diff(b[2]));
        }
        sad += u64::from(row_sad);
        if sad > budget {
            return None;
        }
    }
    Some(sad)
}

/// Best placement of `pattern` inside `image` regardless of threshold.
///
/// The running best SAD is the budget for every later placement, so most
/// placements exit after a few rows. Ties keep the first placement in row
/// order. `None` if the pattern does not fit.
pub(crate) fn best_placement(
    image: RgbView<'_>,
    pattern: RgbView<'_>,
    control: &SearchControl,
) -> MatchResult<Option<Candidate>> {
    let Some((max_x, max_y)) = placement_range(image, pattern) else {
        return Ok(None);
    };
    let mut best: Option<Candidate> = None;
    for y in 0..=max_y {
        control.check()?;
        for x in 0..=max_x {
            let budget = best.map_or(u64::MAX, |b| b.sad.saturating_sub(1));
            if let Some(sad) = sad_at(image, pattern, x, y, budget) {
                if best.map_or(true, |b| sad < b.sad) {
                    best = Some(Candidate { x, y, sad });
                }
            }
        }
    }
    Ok(best)
}

/// Similarity of the single placement at `(x, y)`, or `None` if the pattern
/// does not fit there.
pub fn score_at(image: RgbView<'_>, pattern: RgbView<'_>, x: usize, y: usize) -> Option<f32> {
    let (max_x, max_y) = placement_range(image, pattern)?;
    if x > max_x || y > max_y {
        return None;
    }
    let sad = sad_at(image, pattern, x, y, u64::MAX)?;
    Some(similarity_from_sad(sad, pattern_samples(pattern)))
}

/// Scores a placement by comparing raw interleaved 8-bit samples, reading the
/// capture with the pattern's channel count and without any normalization.
///
/// This is what a byte-level comparison of mismatched formats measures; it
/// exists as a baseline to compare the normalized path against.
pub fn score_unnormalized_at(
    pattern: &Image,
    capture: &Image,
    x: usize,
    y: usize,
) -> MatchResult<f32> {
    let unsupported = |img: &Image| MatchError::UnsupportedPixelFormat {
        channels: img.channels(),
        bits: img.bit_depth().bits(),
    };
    let tpl = pattern.as_u8().ok_or_else(|| unsupported(pattern))?;
    let cap = capture.as_u8().ok_or_else(|| unsupported(capture))?;

    let row_len = pattern.width() * pattern.channels();
    let cap_stride = capture.width() * capture.channels();
    let start = x * capture.channels();
    // A row read past the capture's right edge would wrap into the next row.
    let fits = x + pattern.width() <= capture.width()
        && y + pattern.height() <= capture.height()
        && start + row_len <= cap_stride;
    if !fits {
        return Err(MatchError::InvalidInput("placement outside capture"));
    }
    let mut sad = 0u64;
    for ty in 0..pattern.height() {
        let cap_start = (y + ty) * cap_stride + start;
        let cap_row = cap
            .get(cap_start..cap_start + row_len)
            .ok_or(MatchError::InvalidInput("placement outside capture"))?;
        let tpl_row = &tpl[ty * row_len..(ty + 1) * row_len];
        sad += cap_row
            .iter()
            .zip(tpl_row)
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum::<u64>();
    }
    Ok(similarity_from_sad(sad, (row_len * pattern.height()) as u64))
}
