//! Calibration search over candidate scale factors.

use super::{ScaleEstimator, ScaleFactor};
use crate::geometry::Rect;
use crate::image::Image;
use crate::pattern::Pattern;
use crate::search::{ensure_pattern_area, SearchControl};
use crate::trace::{trace_event, trace_span};
use crate::util::{MatchError, MatchResult};

/// A pattern and a capture known to contain it.
#[derive(Clone, Debug)]
pub struct Calibration<'a> {
    pub pattern: &'a Pattern,
    pub capture: &'a Image,
    /// Restricts every candidate's search to this rectangle.
    pub region: Option<Rect>,
    pub control: SearchControl,
}

impl<'a> Calibration<'a> {
    /// Searches the whole capture with no deadline.
    pub fn new(pattern: &'a Pattern, capture: &'a Image) -> Self {
        Self {
            pattern,
            capture,
            region: None,
            control: SearchControl::new(),
        }
    }

    /// Restricts every candidate's search to `region`.
    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets the deadline and cancel token for the whole calibration.
    pub fn with_control(mut self, control: SearchControl) -> Self {
        self.control = control;
        self
    }
}

/// Best placement found for one candidate factor.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateScore {
    pub factor: f32,
    /// `None` when the scaled pattern vanished or did not fit.
    pub score: Option<f32>,
    pub location: Option<Rect>,
}

/// Result of a calibration search.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationOutcome {
    /// One entry per configured candidate, in configuration order.
    pub scores: Vec<CandidateScore>,
    /// Index into `scores` of the highest score (earliest on ties).
    pub best: Option<usize>,
    /// Index into `scores` of the second highest score.
    pub runner_up: Option<usize>,
    /// The best factor, present only when it leads the runner-up by the
    /// configured margin. A missing runner-up counts as a score of 0.
    pub selected: Option<f32>,
}

impl CalibrationOutcome {
    /// Returns the score of the highest-ranked candidate.
    pub fn best_score(&self) -> Option<&CandidateScore> {
        self.best.map(|i| &self.scores[i])
    }

    /// Returns the score of the second-ranked candidate.
    pub fn runner_up_score(&self) -> Option<&CandidateScore> {
        self.runner_up.map(|i| &self.scores[i])
    }
}

impl ScaleEstimator {
    /// Rescales the pattern by every candidate and scores its best placement
    /// in the calibration capture.
    pub fn calibrate(&self, calibration: &Calibration<'_>) -> MatchResult<CalibrationOutcome> {
        let _span = trace_span!("calibrate_scale", pattern = calibration.pattern.name()).entered();
        if self.cfg.candidates.is_empty() {
            return Err(MatchError::InvalidInput("no scale candidates configured"));
        }
        if !(self.cfg.min_margin >= 0.0) {
            return Err(MatchError::InvalidInput("min_margin must be non-negative"));
        }

        ensure_pattern_area(calibration.pattern, calibration.capture.size())?;
        let pattern = calibration.pattern.normalized(self.matcher.normalizer())?;
        let prepared = self
            .matcher
            .prepare_capture(calibration.capture, calibration.region)?;
        let area = prepared.area(calibration.region)?;

        let mut scores = Vec::with_capacity(self.cfg.candidates.len());
        for &factor in &self.cfg.candidates {
            let scaled = match self.matcher.prepare_pattern(&pattern, ScaleFactor::Known(factor)) {
                Ok(scaled) => scaled,
                Err(MatchError::InvalidRegion { .. }) => {
                    scores.push(CandidateScore {
                        factor,
                        score: None,
                        location: None,
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };
            let view = scaled.as_ref().unwrap_or(&*pattern).view();
            let best = self.matcher.best_placement(view, area, &calibration.control)?;
            scores.push(CandidateScore {
                factor,
                score: best.map(|b| b.score),
                location: best.map(|b| b.rect),
            });
        }

        let (best, runner_up) = rank(&scores);
        let selected = best.and_then(|b| {
            let lead = scores[b].score.unwrap_or(0.0)
                - runner_up.and_then(|r| scores[r].score).unwrap_or(0.0);
            (lead >= self.cfg.min_margin).then_some(scores[b].factor)
        });
        trace_event!(
            info,
            "calibration_done",
            candidates = scores.len(),
            selected = selected.unwrap_or(0.0)
        );

        Ok(CalibrationOutcome {
            scores,
            best,
            runner_up,
            selected,
        })
    }
}

/// Indices of the best and second best scored candidates. Strict comparison
/// keeps the earlier candidate on ties.
fn rank(scores: &[CandidateScore]) -> (Option<usize>, Option<usize>) {
    let mut best: Option<(usize, f32)> = None;
    let mut second: Option<(usize, f32)> = None;
    for (i, entry) in scores.iter().enumerate() {
        let Some(score) = entry.score else { continue };
        match best {
            Some((_, b)) if score <= b => {
                if second.map_or(true, |(_, s)| score > s) {
                    second = Some((i, score));
                }
            }
            _ => {
                second = best;
                best = Some((i, score));
            }
        }
    }
    (best.map(|b| b.0), second.map(|s| s.0))
}
