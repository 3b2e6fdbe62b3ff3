//! Numeric helpers for similarity scores and scale ratios.

/// Converts a sum of absolute differences over `samples` channel values into a
/// similarity in `[0, 1]`, where 1 means identical.
pub(crate) fn similarity_from_sad(sad: u64, samples: u64) -> f32 {
    if samples == 0 {
        return 0.0;
    }
    let max = 255.0f64 * samples as f64;
    (1.0 - sad as f64 / max).clamp(0.0, 1.0) as f32
}

/// Largest SAD that can still score at least `min_similarity`, plus one of
/// slack so float rounding never rejects a qualifying placement early.
pub(crate) fn sad_budget(min_similarity: f32, samples: u64) -> u64 {
    let max = 255.0f64 * samples as f64;
    let allowed = (1.0 - f64::from(min_similarity)).max(0.0) * max;
    allowed.ceil() as u64 + 1
}

/// Length after scaling by `factor`, rounded to the nearest pixel.
pub(crate) fn scaled_len(len: usize, factor: f32) -> usize {
    let scaled = (len as f64 * f64::from(factor)).round();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as usize
    } else {
        0
    }
}

/// Returns the common ratio `num / den` per axis when both axes agree within
/// `tolerance` (relative), otherwise `None`.
pub(crate) fn common_ratio(
    num: (u32, u32),
    den: (u32, u32),
    tolerance: f32,
) -> Option<f32> {
    if num.0 == 0 || num.1 == 0 || den.0 == 0 || den.1 == 0 {
        return None;
    }
    let rx = num.0 as f64 / den.0 as f64;
    let ry = num.1 as f64 / den.1 as f64;
    let spread = (rx - ry).abs() / rx.max(ry);
    if spread <= f64::from(tolerance) {
        Some(((rx + ry) * 0.5) as f32)
    } else {
        None
    }
}
