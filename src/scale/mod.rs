//! Scale estimation between a pattern's native resolution and a capture.
//!
//! Strategies run in a fixed order and the first decisive one wins:
//!
//! 1. a blank capture yields [`ScaleFactor::Unknown`];
//! 2. display metrics (`physical / logical`) when both axes agree;
//! 3. calibration search over candidate factors against a known capture;
//! 4. a previously calibrated prior;
//! 5. identical reference and capture size yields exactly 1.0;
//! 6. the capture-to-reference resolution ratio when both axes agree;
//! 7. otherwise 1.0.
//!
//! Estimation never fails. Callers treat `Unknown` as 1.0.

use crate::geometry::Size;
use crate::search::PatternMatcher;
use crate::trace::trace_event;
use crate::util::math::common_ratio;
use std::fmt;

mod calibrate;

pub use calibrate::{Calibration, CalibrationOutcome, CandidateScore};

/// Factor applied to a pattern before matching.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleFactor {
    /// A positive factor.
    Known(f32),
    /// No strategy could produce a factor (for example a blank capture).
    Unknown,
}

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor::Known(1.0);

    /// Returns the factor, or `None` when unknown.
    pub fn value(self) -> Option<f32> {
        match self {
            ScaleFactor::Known(v) => Some(v),
            ScaleFactor::Unknown => None,
        }
    }

    /// The factor, or 1.0 when unknown.
    pub fn value_or_default(self) -> f32 {
        self.value().unwrap_or(1.0)
    }

    /// Returns true for a known factor.
    pub fn is_known(self) -> bool {
        matches!(self, ScaleFactor::Known(_))
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleFactor::Known(v) => write!(f, "{v}"),
            ScaleFactor::Unknown => f.write_str("unknown"),
        }
    }
}

/// Logical and physical pixel dimensions of a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub logical: Size,
    pub physical: Size,
}

impl DisplayMetrics {
    /// Pairs logical and physical display sizes.
    pub const fn new(logical: Size, physical: Size) -> Self {
        Self { logical, physical }
    }
}

/// Supplies display metrics on demand.
pub trait DisplayMetricsSource: Send + Sync {
    /// Current metrics, or `None` if the display cannot be queried.
    fn metrics(&self) -> Option<DisplayMetrics>;
}

impl DisplayMetricsSource for DisplayMetrics {
    fn metrics(&self) -> Option<DisplayMetrics> {
        Some(*self)
    }
}

/// Extra evidence for [`ScaleEstimator::estimate`].
#[derive(Clone, Debug)]
pub enum ScaleHint<'a> {
    Display(DisplayMetrics),
    Calibration(Calibration<'a>),
    /// A factor selected by an earlier calibration.
    Prior(f32),
}

/// Scale estimation settings.
#[derive(Clone, Debug)]
pub struct ScaleConfig {
    /// Candidate factors for calibration, in tie-break order.
    pub candidates: Vec<f32>,
    /// Score lead the best candidate needs over the runner-up.
    pub min_margin: f32,
    /// Largest relative disagreement between the per-axis ratios.
    pub axis_tolerance: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            candidates: vec![1.0, 0.8, 0.75, 0.667, 0.5, 1.25, 1.5],
            min_margin: 0.05,
            axis_tolerance: 0.02,
        }
    }
}

/// Picks the scale factor for a pattern and capture pair.
#[derive(Clone, Debug, Default)]
pub struct ScaleEstimator {
    cfg: ScaleConfig,
    matcher: PatternMatcher,
}

impl ScaleEstimator {
    /// Creates an estimator with `cfg`.
    pub fn new(cfg: ScaleConfig) -> Self {
        Self {
            cfg,
            matcher: PatternMatcher::default(),
        }
    }

    /// Uses `matcher` (and its normalizer) for calibration.
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Returns the estimator settings.
    pub fn config(&self) -> &ScaleConfig {
        &self.cfg
    }

    /// Estimates with at most one hint.
    pub fn estimate(&self, reference: Size, capture: Size, hint: Option<ScaleHint<'_>>) -> ScaleFactor {
        match hint {
            Some(hint) => self.estimate_with(reference, capture, std::slice::from_ref(&hint)),
            None => self.estimate_with(reference, capture, &[]),
        }
    }

    /// Estimates with any number of hints; each kind is consulted in strategy
    /// order regardless of its position in `hints`.
    pub fn estimate_with(&self, reference: Size, capture: Size, hints: &[ScaleHint<'_>]) -> ScaleFactor {
        if capture.is_empty() {
            trace_event!(warn, "scale_unknown", capture = capture);
            return ScaleFactor::Unknown;
        }

        for hint in hints {
            if let ScaleHint::Display(metrics) = hint {
                if let Some(factor) = self.from_display(metrics) {
                    trace_event!(info, "scale_selected", strategy = "display", factor = factor);
                    return ScaleFactor::Known(factor);
                }
            }
        }

        for hint in hints {
            if let ScaleHint::Calibration(calibration) = hint {
                match self.calibrate(calibration) {
                    Ok(outcome) => {
                        if let Some(factor) = outcome.selected {
                            trace_event!(
                                info,
                                "scale_selected",
                                strategy = "calibration",
                                factor = factor
                            );
                            return ScaleFactor::Known(factor);
                        }
                    }
                    Err(err) => {
                        trace_event!(warn, "calibration_failed", error = err);
                    }
                }
            }
        }

        for hint in hints {
            if let ScaleHint::Prior(factor) = *hint {
                if factor.is_finite() && factor > 0.0 {
                    trace_event!(info, "scale_selected", strategy = "prior", factor = factor);
                    return ScaleFactor::Known(factor);
                }
            }
        }

        if reference == capture {
            return ScaleFactor::IDENTITY;
        }

        let ratio = common_ratio(
            (capture.width, capture.height),
            (reference.width, reference.height),
            self.cfg.axis_tolerance,
        );
        match ratio {
            Some(factor) => {
                trace_event!(info, "scale_selected", strategy = "resolution", factor = factor);
                ScaleFactor::Known(factor)
            }
            None => {
                trace_event!(
                    warn,
                    "scale_fallback",
                    reference = reference,
                    capture = capture
                );
                ScaleFactor::IDENTITY
            }
        }
    }

    fn from_display(&self, metrics: &DisplayMetrics) -> Option<f32> {
        let ratio = common_ratio(
            (metrics.physical.width, metrics.physical.height),
            (metrics.logical.width, metrics.logical.height),
            self.cfg.axis_tolerance,
        );
        if ratio.is_none() {
            trace_event!(
                warn,
                "display_metrics_untrusted",
                logical = metrics.logical,
                physical = metrics.physical
            );
        }
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::{DisplayMetrics, ScaleConfig, ScaleEstimator, ScaleFactor, ScaleHint};
    use crate::geometry::Size;

    const HD: Size = Size::new(1920, 1080);

    #[test]
    fn identical_sizes_give_exactly_one() {
        let est = ScaleEstimator::default();
        for size in [HD, Size::new(1, 1), Size::new(1366, 768)] {
            assert_eq!(est.estimate(size, size, None), ScaleFactor::Known(1.0));
        }
    }

    #[test]
    fn blank_capture_is_unknown() {
        let est = ScaleEstimator::default();
        assert_eq!(est.estimate(HD, Size::new(0, 864), None), ScaleFactor::Unknown);
        assert_eq!(
            est.estimate(HD, Size::new(1536, 0), Some(ScaleHint::Prior(0.8))),
            ScaleFactor::Unknown
        );
    }

    #[test]
    fn display_metrics_take_precedence() {
        let est = ScaleEstimator::default();
        let metrics = DisplayMetrics::new(Size::new(1536, 864), HD);
        let hints = [ScaleHint::Prior(0.5), ScaleHint::Display(metrics)];
        assert_eq!(
            est.estimate_with(HD, Size::new(1536, 864), &hints),
            ScaleFactor::Known(1.25)
        );
    }

    #[test]
    fn untrusted_display_metrics_fall_through() {
        let est = ScaleEstimator::default();
        let skewed = DisplayMetrics::new(Size::new(1536, 1080), HD);
        assert_eq!(
            est.estimate(HD, Size::new(1536, 864), Some(ScaleHint::Display(skewed))),
            ScaleFactor::Known(0.8)
        );
    }

    #[test]
    fn prior_beats_resolution_ratio() {
        let est = ScaleEstimator::default();
        assert_eq!(
            est.estimate(HD, Size::new(1536, 864), Some(ScaleHint::Prior(0.75))),
            ScaleFactor::Known(0.75)
        );
    }

    #[test]
    fn disagreeing_axes_default_to_one() {
        let est = ScaleEstimator::new(ScaleConfig {
            axis_tolerance: 0.0,
            ..ScaleConfig::default()
        });
        assert_eq!(est.estimate(HD, Size::new(1600, 1000), None), ScaleFactor::Known(1.0));
    }

    #[test]
    fn unknown_reads_as_identity() {
        assert_eq!(ScaleFactor::Unknown.value_or_default(), 1.0);
        assert_eq!(ScaleFactor::Known(0.8).value(), Some(0.8));
        assert!(!ScaleFactor::Unknown.is_known());
    }
}
