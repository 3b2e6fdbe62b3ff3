//! The locator facade.
//!
//! A [`Locator`] owns the registered targets, their dependency graph, the
//! match cache and the matcher. Targets are added once at startup through
//! `&mut self`; searching, resolving and reading results afterwards go through
//! `&self`, so a single locator can serve searches from several threads.

use crate::cache::{MatchCache, SearchState};
use crate::capture::CaptureSource;
use crate::geometry::{Rect, RegionOffset, SearchRegion, Size};
use crate::graph::{RegionDependencyGraph, RegionResolver};
use crate::image::normalize::{FormatNormalizer, NEUTRAL_BACKGROUND};
use crate::image::{Image, Rgb};
use crate::pattern::Pattern;
use crate::scale::{
    Calibration, CalibrationOutcome, DisplayMetricsSource, ScaleConfig, ScaleEstimator,
    ScaleFactor, ScaleHint,
};
use crate::search::{
    ensure_pattern_area, Match, MatchConfig, MatchRequest, PatternMatcher, PreparedCapture,
    SearchControl, DEFAULT_MIN_SIMILARITY,
};
use crate::target::{TargetId, TrackableTarget};
use crate::trace::{trace_event, trace_span};
use crate::util::{GraphError, LocateError, MatchError, ResolutionError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Settings for a [`Locator`].
#[derive(Clone, Debug)]
pub struct LocatorConfig {
    /// Threshold for patterns that do not set their own.
    pub default_min_similarity: f32,
    pub matching: MatchConfig,
    pub scale: ScaleConfig,
    /// Color translucent pixels are composited over.
    pub background: Rgb,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            default_min_similarity: DEFAULT_MIN_SIMILARITY,
            matching: MatchConfig::default(),
            scale: ScaleConfig::default(),
            background: NEUTRAL_BACKGROUND,
        }
    }
}

/// Finds targets in captures and tracks where they were last seen.
pub struct Locator {
    cfg: LocatorConfig,
    targets: HashMap<TargetId, TrackableTarget>,
    order: Vec<TargetId>,
    graph: RegionDependencyGraph,
    resolver: RegionResolver,
    cache: MatchCache,
    matcher: PatternMatcher,
    estimator: ScaleEstimator,
    priors: RwLock<HashMap<TargetId, f32>>,
    display: Option<Arc<dyn DisplayMetricsSource>>,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

impl Locator {
    /// Creates an empty locator with `cfg`.
    pub fn new(cfg: LocatorConfig) -> Self {
        let matcher = PatternMatcher::new()
            .with_config(cfg.matching.clone())
            .with_normalizer(FormatNormalizer::with_background(cfg.background));
        let estimator = ScaleEstimator::new(cfg.scale.clone()).with_matcher(matcher.clone());
        Self {
            cfg,
            targets: HashMap::new(),
            order: Vec::new(),
            graph: RegionDependencyGraph::new(),
            resolver: RegionResolver::new(),
            cache: MatchCache::new(),
            matcher,
            estimator,
            priors: RwLock::new(HashMap::new()),
            display: None,
        }
    }

    /// Consults `source` for display metrics before every scale estimate.
    pub fn with_display_metrics(mut self, source: Arc<dyn DisplayMetricsSource>) -> Self {
        self.display = Some(source);
        self
    }

    /// Returns the locator settings.
    pub fn config(&self) -> &LocatorConfig {
        &self.cfg
    }

    /// Returns the cache of last matches per target.
    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    /// Returns the dependency graph of registered targets.
    pub fn graph(&self) -> &RegionDependencyGraph {
        &self.graph
    }

    /// Registers a target. If it declares an anchor, the anchor must already
    /// be registered; the edge is checked like [`Locator::register_dependency`]
    /// and the target is not added when the check fails.
    pub fn add_target(&mut self, target: TrackableTarget) -> Result<(), LocateError> {
        let id = target.id().clone();
        if self.targets.contains_key(&id) {
            return Err(LocateError::DuplicateTarget(id));
        }
        if let Some(dep) = target.dependency() {
            if !self.targets.contains_key(&dep.anchor) {
                return Err(GraphError::UnknownTarget(dep.anchor.clone()).into());
            }
            self.graph.add_dependency(&id, &dep.anchor, dep.offset)?;
        }
        if let Some(region) = target.region() {
            self.resolver.set_fixed_region(id.clone(), region);
        }
        self.order.push(id.clone());
        self.targets.insert(id, target);
        Ok(())
    }

    /// Returns the registered target `id`.
    pub fn target(&self, id: &TargetId) -> Option<&TrackableTarget> {
        self.targets.get(id)
    }

    /// Registered target ids in insertion order.
    pub fn target_ids(&self) -> &[TargetId] {
        &self.order
    }

    /// Registered targets ordered so anchors come before their dependents.
    pub fn search_order(&self) -> Vec<TargetId> {
        self.graph.search_order(&self.order)
    }

    /// Derives `target`'s search region from `anchor`'s last match. Replaces
    /// any existing anchor of `target`.
    pub fn register_dependency(
        &self,
        target: &TargetId,
        anchor: &TargetId,
        offset: RegionOffset,
    ) -> Result<(), GraphError> {
        for id in [target, anchor] {
            if !self.targets.contains_key(id) {
                return Err(GraphError::UnknownTarget(id.clone()));
            }
        }
        self.graph.add_dependency(target, anchor, offset)
    }

    /// Resolves where `target` should be searched for next.
    pub fn resolve_search_region(&self, target: &TargetId) -> Result<SearchRegion, ResolutionError> {
        if !self.targets.contains_key(target) {
            return Err(ResolutionError::UnknownTarget(target.clone()));
        }
        self.resolver.resolve(target, &self.graph, &self.cache)
    }

    /// Searches `capture` for `target` with the configured default timeout.
    pub fn find_target(&self, target: &TargetId, capture: &Image) -> Result<Vec<Match>, LocateError> {
        let control = match self.cfg.matching.timeout {
            Some(timeout) => SearchControl::new().with_timeout(timeout),
            None => SearchControl::new(),
        };
        self.find_target_with(target, capture, control)
    }

    /// Searches `capture` for `target` under an explicit deadline and cancel
    /// token.
    ///
    /// Every pattern of the target is matched inside the resolved region; the
    /// combined matches are ranked, capped and saved to the cache. Any error
    /// leaves the cache entry as it was.
    pub fn find_target_with(
        &self,
        target: &TargetId,
        capture: &Image,
        control: SearchControl,
    ) -> Result<Vec<Match>, LocateError> {
        let _span = trace_span!("find_target", target_id = target.as_str()).entered();
        let entry = self
            .targets
            .get(target)
            .ok_or_else(|| LocateError::UnknownTarget(target.clone()))?;
        let region = self.resolve_search_region(target)?;
        let hints = self.scale_hints(target);

        let regions: Vec<Option<Rect>> = entry
            .patterns()
            .iter()
            .map(|pattern| region.as_rect().or_else(|| pattern.region_hint()))
            .collect();
        let prepared = self.prepare_target_capture(entry.patterns(), &regions, capture)?;

        let mut matches = Vec::new();
        for (pattern, &pattern_region) in entry.patterns().iter().zip(&regions) {
            let scale = self.pattern_scale(pattern, capture.size(), &hints);
            let req = MatchRequest::new(target, pattern, capture)
                .region(pattern_region)
                .min_similarity(
                    pattern
                        .min_similarity()
                        .unwrap_or(self.cfg.default_min_similarity),
                )
                .scale(scale)
                .control(control.clone());
            matches.extend(self.matcher.find_prepared(&req, &prepared)?);
        }

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.rect.y.cmp(&b.rect.y))
                .then_with(|| a.rect.x.cmp(&b.rect.x))
        });
        matches.truncate(self.cfg.matching.max_matches);
        trace_event!(info, "target_searched", matches = matches.len());

        self.cache.save(target, matches.clone());
        Ok(matches)
    }

    /// Captures a frame from `source` and searches it for `target`.
    pub fn capture_and_find(
        &self,
        target: &TargetId,
        source: &dyn CaptureSource,
    ) -> Result<Vec<Match>, LocateError> {
        let capture = source.capture()?;
        self.find_target(target, &capture)
    }

    /// Returns the matches saved by the last search for `target`.
    pub fn last_matches(&self, target: &TargetId) -> Arc<[Match]> {
        self.cache.get(target)
    }

    /// Returns whether `target` is unsearched, found or not found.
    pub fn search_state(&self, target: &TargetId) -> SearchState {
        self.cache.state(target)
    }

    /// Forgets the last matches of `target`. Dependents report
    /// `AnchorNotYetFound` until it is found again.
    pub fn clear_matches(&self, target: &TargetId) -> bool {
        self.cache.clear(target)
    }

    /// Scale factor each of `target`'s patterns would be searched at in a
    /// capture of `capture` size.
    pub fn estimate_scale(&self, target: &TargetId, capture: Size) -> Result<Vec<ScaleFactor>, LocateError> {
        let entry = self
            .targets
            .get(target)
            .ok_or_else(|| LocateError::UnknownTarget(target.clone()))?;
        let hints = self.scale_hints(target);
        Ok(entry
            .patterns()
            .iter()
            .map(|p| self.pattern_scale(p, capture, &hints))
            .collect())
    }

    /// Runs a calibration search with `target`'s first pattern. A decisive
    /// result is stored as the target's prior for later estimates.
    pub fn calibrate_scale(
        &self,
        target: &TargetId,
        capture: &Image,
        region: Option<Rect>,
    ) -> Result<CalibrationOutcome, LocateError> {
        let entry = self
            .targets
            .get(target)
            .ok_or_else(|| LocateError::UnknownTarget(target.clone()))?;
        let pattern = entry
            .patterns()
            .first()
            .ok_or(MatchError::InvalidInput("target has no patterns"))?;
        let mut calibration = Calibration::new(pattern, capture);
        calibration.region = region;
        if let Some(timeout) = self.cfg.matching.timeout {
            calibration.control = SearchControl::new().with_timeout(timeout);
        }
        let outcome = self.estimator.calibrate(&calibration)?;
        if let Some(factor) = outcome.selected {
            self.priors
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(target.clone(), factor);
        }
        Ok(outcome)
    }

    /// Factor stored by the last decisive calibration of `target`.
    pub fn scale_prior(&self, target: &TargetId) -> Option<f32> {
        self.priors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .copied()
    }

    /// Normalizes the part of `capture` that any of the patterns will scan,
    /// once for all of them.
    fn prepare_target_capture(
        &self,
        patterns: &[Arc<Pattern>],
        regions: &[Option<Rect>],
        capture: &Image,
    ) -> Result<PreparedCapture, MatchError> {
        let bounds = capture.size();
        for pattern in patterns {
            ensure_pattern_area(pattern, bounds)?;
        }
        let mut covering: Option<Rect> = None;
        for region in regions {
            let Some(rect) = region else {
                return self.matcher.prepare_capture(capture, None);
            };
            if !rect.fits_within(bounds) {
                return Err(MatchError::InvalidRegion {
                    region: *rect,
                    bounds,
                });
            }
            covering = Some(covering.map_or(*rect, |c| c.union(rect)));
        }
        self.matcher.prepare_capture(capture, covering)
    }

    fn scale_hints(&self, target: &TargetId) -> Vec<ScaleHint<'static>> {
        let mut hints = Vec::new();
        if let Some(metrics) = self.display.as_ref().and_then(|d| d.metrics()) {
            hints.push(ScaleHint::Display(metrics));
        }
        if let Some(prior) = self.scale_prior(target) {
            hints.push(ScaleHint::Prior(prior));
        }
        hints
    }

    fn pattern_scale(&self, pattern: &Pattern, capture: Size, hints: &[ScaleHint<'_>]) -> ScaleFactor {
        let reference = pattern.native_resolution().unwrap_or(capture);
        let scale = self.estimator.estimate_with(reference, capture, hints);
        if !scale.is_known() {
            trace_event!(warn, "scale_defaulted", pattern = pattern.name(), factor = 1.0);
        }
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::{Locator, LocatorConfig};
    use crate::cache::SearchState;
    use crate::capture::{FrameSequence, StillCapture};
    use crate::geometry::{Rect, RegionOffset, SearchRegion, Size};
    use crate::image::{Image, RgbImage};
    use crate::pattern::Pattern;
    use crate::scale::{DisplayMetrics, ScaleFactor};
    use crate::target::{TargetId, TrackableTarget};
    use crate::util::{GraphError, LocateError, MatchError, ResolutionError};
    use std::sync::Arc;

    fn glyph(seed: usize) -> RgbImage {
        RgbImage::from_fn(6, 4, |x, y| {
            [
                ((x * 41 + seed * 97) & 0xFF) as u8,
                ((y * 67 + seed * 61) & 0xFF) as u8,
                (((x + y) * 29 + seed * 151) & 0xFF) as u8,
            ]
        })
        .unwrap()
    }

    fn scene(items: &[(usize, usize, usize)]) -> Image {
        let glyphs: Vec<_> = items.iter().map(|&(_, _, s)| glyph(s)).collect();
        RgbImage::from_fn(48, 32, |x, y| {
            for (&(gx, gy, _), g) in items.iter().zip(&glyphs) {
                if (gx..gx + 6).contains(&x) && (gy..gy + 4).contains(&y) {
                    return *g.view().get(x - gx, y - gy).unwrap();
                }
            }
            [0, 0, 0]
        })
        .unwrap()
        .to_image()
    }

    fn target(id: &str, seed: usize) -> TrackableTarget {
        TrackableTarget::new(id)
            .with_pattern(Pattern::new(id, glyph(seed).to_image()).with_min_similarity(0.95))
    }

    fn locator() -> Locator {
        let mut loc = Locator::new(LocatorConfig::default());
        loc.add_target(target("anchor", 1)).unwrap();
        loc.add_target(
            target("dependent", 2).depends_on("anchor", RegionOffset::new(10, -2, 4, 4)),
        )
        .unwrap();
        loc
    }

    #[test]
    fn dependent_follows_anchor() {
        let loc = locator();
        let (a, d) = (TargetId::from("anchor"), TargetId::from("dependent"));
        let capture = scene(&[(5, 10, 1), (16, 9, 2)]);

        let err = loc.find_target(&d, &capture).unwrap_err();
        assert!(err.is_anchor_pending());
        assert_eq!(loc.search_state(&d), SearchState::Unsearched);

        let found = loc.find_target(&a, &capture).unwrap();
        assert_eq!(found[0].rect, Rect::new(5, 10, 6, 4));
        assert_eq!(
            loc.resolve_search_region(&d),
            Ok(SearchRegion::Area(Rect::new(15, 8, 10, 8)))
        );

        let found = loc.find_target(&d, &capture).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rect, Rect::new(16, 9, 6, 4));
        assert_eq!(loc.last_matches(&d)[0], found[0]);
        assert_eq!(loc.search_state(&d), SearchState::Found);

        assert!(loc.clear_matches(&a));
        assert!(matches!(
            loc.resolve_search_region(&d),
            Err(ResolutionError::AnchorNotYetFound { .. })
        ));
    }

    #[test]
    fn missing_target_records_not_found() {
        let loc = locator();
        let a = TargetId::from("anchor");
        let blank = scene(&[]);
        assert!(loc.find_target(&a, &blank).unwrap().is_empty());
        assert_eq!(loc.search_state(&a), SearchState::NotFound);
    }

    #[test]
    fn failed_search_keeps_previous_entry() {
        let mut loc = locator();
        let a = TargetId::from("anchor");
        loc.find_target(&a, &scene(&[(5, 10, 1)])).unwrap();

        loc.add_target(target("boxed", 3).with_region(Rect::new(40, 0, 20, 20)))
            .unwrap();
        let boxed = TargetId::from("boxed");
        let err = loc.find_target(&boxed, &scene(&[])).unwrap_err();
        assert!(matches!(err, LocateError::Match(MatchError::InvalidRegion { .. })));
        assert_eq!(loc.search_state(&boxed), SearchState::Unsearched);
        assert_eq!(loc.last_matches(&a).len(), 1);
    }

    #[test]
    fn registration_errors() {
        let mut loc = locator();
        assert_eq!(
            loc.add_target(target("anchor", 9)),
            Err(LocateError::DuplicateTarget(TargetId::from("anchor")))
        );
        assert_eq!(
            loc.add_target(target("orphan", 9).depends_on("ghost", RegionOffset::default())),
            Err(LocateError::Graph(GraphError::UnknownTarget(TargetId::from("ghost"))))
        );
        assert!(loc.target(&TargetId::from("orphan")).is_none());

        let err = loc
            .register_dependency(
                &TargetId::from("anchor"),
                &TargetId::from("dependent"),
                RegionOffset::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::CyclicDependency { .. }));
        assert_eq!(
            loc.find_target(&TargetId::from("ghost"), &scene(&[])),
            Err(LocateError::UnknownTarget(TargetId::from("ghost")))
        );
        assert_eq!(
            loc.search_order(),
            vec![TargetId::from("anchor"), TargetId::from("dependent")]
        );
    }

    #[test]
    fn capture_sources_feed_searches() {
        let loc = locator();
        let a = TargetId::from("anchor");
        let still = StillCapture::new(scene(&[(30, 20, 1)]));
        assert_eq!(
            loc.capture_and_find(&a, &still).unwrap()[0].rect,
            Rect::new(30, 20, 6, 4)
        );
        let frames = FrameSequence::new(Vec::new());
        assert!(loc.capture_and_find(&a, &frames).is_err());
    }

    #[test]
    fn scale_estimates_use_display_metrics() {
        let mut loc = Locator::default().with_display_metrics(Arc::new(DisplayMetrics::new(
            Size::new(1000, 500),
            Size::new(1250, 625),
        )));
        let pattern = Pattern::new("p", glyph(0).to_image()).with_native_resolution(Size::new(800, 600));
        loc.add_target(TrackableTarget::new("t").with_pattern(pattern))
            .unwrap();
        assert_eq!(
            loc.estimate_scale(&TargetId::from("t"), Size::new(640, 480)).unwrap(),
            vec![ScaleFactor::Known(1.25)]
        );
    }

    #[test]
    fn patterns_with_separate_hints_share_one_capture() {
        let mut loc = Locator::default();
        let left = Pattern::new("left", glyph(4).to_image())
            .with_min_similarity(0.95)
            .with_region_hint(Rect::new(0, 0, 20, 16));
        let right = Pattern::new("right", glyph(5).to_image())
            .with_min_similarity(0.95)
            .with_region_hint(Rect::new(28, 16, 20, 16));
        loc.add_target(TrackableTarget::new("pair").with_pattern(left).with_pattern(right))
            .unwrap();

        // The copy of glyph 5 at (3, 20) lies outside both hints.
        let capture = scene(&[(3, 5, 4), (33, 20, 5), (3, 20, 5)]);
        let found = loc.find_target(&TargetId::from("pair"), &capture).unwrap();
        let mut rects: Vec<_> = found.iter().map(|m| (&*m.pattern, m.rect)).collect();
        rects.sort_by_key(|(_, r)| (r.x, r.y));
        assert_eq!(
            rects,
            vec![
                ("left", Rect::new(3, 5, 6, 4)),
                ("right", Rect::new(33, 20, 6, 4)),
            ]
        );
    }
}
