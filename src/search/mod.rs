//! Pattern search over captures.
//!
//! `PatternMatcher::find_matches` normalizes the pattern and the searched part
//! of the capture, rescales the pattern by the request's explicit
//! `ScaleFactor`, scans the search region and returns every distinct placement
//! that clears the similarity threshold, best first, in absolute capture
//! coordinates.
//!
//! Only the pixels inside the search region are converted, so a region search
//! costs in proportion to the region. Callers running several patterns against
//! one capture prepare it once with `prepare_capture` and reuse it.

use crate::candidate::nms::nms_2d;
use crate::geometry::{Rect, Size};
use crate::image::normalize::FormatNormalizer;
use crate::image::{Image, RgbImage, RgbView};
use crate::pattern::resize::scale_pattern;
use crate::pattern::Pattern;
use crate::scale::ScaleFactor;
use crate::target::TargetId;
use crate::trace::{trace_event, trace_span};
use crate::util::math::similarity_from_sad;
use crate::util::{MatchError, MatchResult};
use std::sync::Arc;
use std::time::Duration;

pub mod control;
#[cfg(feature = "rayon")]
pub(crate) mod parallel;
pub(crate) mod scan;

pub use control::{CancelToken, SearchControl};

/// Minimum similarity used when neither the pattern nor the caller sets one.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.70;

/// Scale factors closer to 1.0 than this skip resampling.
const IDENTITY_EPS: f32 = 1e-6;

/// Configuration for pattern searches.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Maximum number of matches returned per search.
    pub max_matches: usize,
    /// Chebyshev radius within which weaker placements are suppressed.
    /// `None` uses half of the scaled pattern's smaller side.
    pub nms_radius: Option<usize>,
    /// Scan rows in parallel (requires the `rayon` feature).
    pub parallel: bool,
    /// Default time budget for a search issued without an explicit control.
    pub timeout: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_matches: 100,
            nms_radius: None,
            parallel: false,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// A located occurrence of a pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    /// Absolute capture rectangle, sized like the scaled pattern.
    pub rect: Rect,
    /// Similarity in `[0, 1]`.
    pub score: f32,
    /// Target the search was issued for.
    pub target: TargetId,
    /// Name of the pattern that produced the match.
    pub pattern: Arc<str>,
}

/// Placement found by a scan, before it is attributed to a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Located {
    pub(crate) rect: Rect,
    pub(crate) score: f32,
}

/// Inputs of a single pattern search.
#[derive(Clone, Debug)]
pub struct MatchRequest<'a> {
    target: TargetId,
    pattern: &'a Pattern,
    capture: &'a Image,
    region: Option<Rect>,
    min_similarity: f32,
    scale: ScaleFactor,
    control: SearchControl,
}

impl<'a> MatchRequest<'a> {
    /// Full-capture search at scale 1.0 with the pattern's own threshold (or
    /// the default) and no deadline.
    pub fn new(target: &TargetId, pattern: &'a Pattern, capture: &'a Image) -> Self {
        Self {
            target: target.clone(),
            pattern,
            capture,
            region: None,
            min_similarity: pattern.min_similarity().unwrap_or(DEFAULT_MIN_SIMILARITY),
            scale: ScaleFactor::IDENTITY,
            control: SearchControl::new(),
        }
    }

    /// Restricts the scan to `region`; `None` scans the whole capture.
    pub fn region(mut self, region: Option<Rect>) -> Self {
        self.region = region;
        self
    }

    /// Overrides the pattern's threshold for this search.
    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Scale applied to the pattern; `Unknown` is treated as 1.0.
    pub fn scale(mut self, scale: ScaleFactor) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the deadline and cancellation token checked during the scan.
    pub fn control(mut self, control: SearchControl) -> Self {
        self.control = control;
        self
    }
}

/// Scale-aware pattern matcher.
///
/// Holds configuration only; it is cheap to clone and safe to share between
/// threads.
#[derive(Clone, Debug, Default)]
pub struct PatternMatcher {
    cfg: MatchConfig,
    normalizer: FormatNormalizer,
}

/// A capture normalized once, ready for any number of pattern searches.
///
/// Holds either the whole capture or only a covering region of it; `origin`
/// places the held pixels in the capture.
#[derive(Clone, Debug)]
pub(crate) struct PreparedCapture {
    pixels: RgbImage,
    origin: (usize, usize),
    bounds: Size,
}

impl PreparedCapture {
    /// Returns the view to scan for `region`, in absolute coordinates.
    ///
    /// A region outside the capture is `InvalidRegion`; a region the capture
    /// was not prepared for is a caller error.
    pub(crate) fn area(&self, region: Option<Rect>) -> MatchResult<RgbView<'_>> {
        let held = self.pixels.view().with_origin(self.origin);
        let Some(rect) = region else {
            if self.origin != (0, 0) || self.pixels.size() != self.bounds {
                return Err(MatchError::InvalidInput("capture was prepared for a region only"));
            }
            return Ok(held);
        };
        if !rect.fits_within(self.bounds) {
            return Err(MatchError::InvalidRegion {
                region: rect,
                bounds: self.bounds,
            });
        }
        let local = Rect::new(
            rect.x - to_coord(self.origin.0),
            rect.y - to_coord(self.origin.1),
            rect.width,
            rect.height,
        );
        if !local.fits_within(self.pixels.size()) {
            return Err(MatchError::InvalidInput("region lies outside the prepared capture"));
        }
        held.roi(local)
    }

    /// Returns the size of the full capture.
    pub(crate) fn bounds(&self) -> Size {
        self.bounds
    }
}

impl PatternMatcher {
    /// Creates a matcher with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the search configuration.
    pub fn with_config(mut self, cfg: MatchConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Replaces the normalizer applied to patterns and captures.
    pub fn with_normalizer(mut self, normalizer: FormatNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Returns the search configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    /// Returns the normalizer applied to patterns and captures.
    pub fn normalizer(&self) -> &FormatNormalizer {
        &self.normalizer
    }

    /// Normalizes the part of `capture` covered by `region`, or all of it.
    pub(crate) fn prepare_capture(
        &self,
        capture: &Image,
        region: Option<Rect>,
    ) -> MatchResult<PreparedCapture> {
        let (pixels, origin) = match region {
            Some(rect) => {
                let pixels = self.normalizer.normalize_region(capture, rect)?;
                // normalize_region rejects negative origins.
                (pixels, (rect.x as usize, rect.y as usize))
            }
            None => (self.normalizer.normalize(capture)?, (0, 0)),
        };
        Ok(PreparedCapture {
            pixels,
            origin,
            bounds: capture.size(),
        })
    }

    /// Runs one search. An empty list means nothing cleared the threshold.
    pub fn find_matches(&self, req: &MatchRequest<'_>) -> MatchResult<Vec<Match>> {
        ensure_pattern_area(req.pattern, req.capture.size())?;
        let prepared = self.prepare_capture(req.capture, req.region)?;
        self.find_prepared(req, &prepared)
    }

    /// Runs one search against a capture normalized by `prepare_capture`.
    ///
    /// The pixels come from `prepared`, which must cover `req.region`;
    /// `req.capture` is not read again.
    pub(crate) fn find_prepared(
        &self,
        req: &MatchRequest<'_>,
        prepared: &PreparedCapture,
    ) -> MatchResult<Vec<Match>> {
        let _span = trace_span!(
            "find_matches",
            pattern = req.pattern.name(),
            min_similarity = req.min_similarity
        )
        .entered();

        ensure_pattern_area(req.pattern, prepared.bounds())?;
        let area = prepared.area(req.region)?;
        let pattern = req.pattern.normalized(&self.normalizer)?;
        let scaled = self.prepare_pattern(&pattern, req.scale)?;
        let pattern_view = scaled.as_ref().unwrap_or(&*pattern).view();

        let located = self.locate(pattern_view, area, req.min_similarity, &req.control)?;
        let name = req.pattern.shared_name();
        Ok(located
            .into_iter()
            .map(|l| Match {
                rect: l.rect,
                score: l.score,
                target: req.target.clone(),
                pattern: Arc::clone(&name),
            })
            .collect())
    }

    /// Resamples the pattern unless the factor is the identity.
    pub(crate) fn prepare_pattern(
        &self,
        pattern: &RgbImage,
        scale: ScaleFactor,
    ) -> MatchResult<Option<RgbImage>> {
        let factor = scale.value_or_default();
        if (factor - 1.0).abs() < IDENTITY_EPS {
            return Ok(None);
        }
        scale_pattern(pattern.view(), factor).map(Some)
    }

    /// Scans `area`, already cut to the search region, for a prepared
    /// (normalized, scaled) pattern.
    pub(crate) fn locate(
        &self,
        pattern: RgbView<'_>,
        area: RgbView<'_>,
        min_similarity: f32,
        control: &SearchControl,
    ) -> MatchResult<Vec<Located>> {
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(MatchError::InvalidInput("min_similarity must be within [0, 1]"));
        }
        if self.cfg.max_matches == 0 {
            return Err(MatchError::InvalidInput("max_matches must be at least 1"));
        }
        control.check()?;

        let mut candidates = self.scan(area, pattern, min_similarity, control)?;
        trace_event!(info, "scan_candidates", count = candidates.len());
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let radius = self
            .cfg
            .nms_radius
            .unwrap_or(pattern.width().min(pattern.height()) / 2);
        let kept = nms_2d(&mut candidates, radius, self.cfg.max_matches);

        let samples = pattern.width() as u64 * pattern.height() as u64 * 3;
        let (ox, oy) = area.origin();
        let size = pattern.size();
        Ok(kept
            .into_iter()
            .map(|c| Located {
                rect: Rect::new(
                    to_coord(ox + c.x),
                    to_coord(oy + c.y),
                    size.width,
                    size.height,
                ),
                score: similarity_from_sad(c.sad, samples),
            })
            .collect())
    }

    /// Single best placement of a prepared pattern, without a threshold.
    pub(crate) fn best_placement(
        &self,
        pattern: RgbView<'_>,
        area: RgbView<'_>,
        control: &SearchControl,
    ) -> MatchResult<Option<Located>> {
        let Some(best) = scan::best_placement(area, pattern, control)? else {
            return Ok(None);
        };
        let (ox, oy) = area.origin();
        let size = pattern.size();
        Ok(Some(Located {
            rect: Rect::new(
                to_coord(ox + best.x),
                to_coord(oy + best.y),
                size.width,
                size.height,
            ),
            score: similarity_from_sad(best.sad, scan::pattern_samples(pattern)),
        }))
    }

    #[cfg(feature = "rayon")]
    fn scan(
        &self,
        area: RgbView<'_>,
        pattern: RgbView<'_>,
        min_similarity: f32,
        control: &SearchControl,
    ) -> MatchResult<Vec<crate::candidate::Candidate>> {
        if self.cfg.parallel {
            parallel::scan_sad_par(area, pattern, min_similarity, control)
        } else {
            scan::scan_sad(area, pattern, min_similarity, control)
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn scan(
        &self,
        area: RgbView<'_>,
        pattern: RgbView<'_>,
        min_similarity: f32,
        control: &SearchControl,
    ) -> MatchResult<Vec<crate::candidate::Candidate>> {
        scan::scan_sad(area, pattern, min_similarity, control)
    }
}

/// A pattern without pixels can never be placed; it is reported as an empty
/// region rather than a dimension error.
pub(crate) fn ensure_pattern_area(pattern: &Pattern, bounds: Size) -> MatchResult<()> {
    if pattern.image().is_empty() {
        return Err(MatchError::InvalidRegion {
            region: Rect::from_size(pattern.image().size()),
            bounds,
        });
    }
    Ok(())
}

fn to_coord(v: usize) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
