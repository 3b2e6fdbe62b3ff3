//! Effective search regions from the dependency graph and the match cache.

use super::RegionDependencyGraph;
use crate::cache::MatchCache;
use crate::geometry::{Rect, SearchRegion};
use crate::target::TargetId;
use crate::util::ResolutionError;
use std::collections::HashMap;

/// Computes where a target should be searched.
///
/// Holds the fixed regions of unanchored targets. Regions of anchored targets
/// are derived on every call from the anchor's best cached match, so they
/// follow the anchor as soon as a new search result is saved.
#[derive(Clone, Debug, Default)]
pub struct RegionResolver {
    fixed: HashMap<TargetId, Rect>,
}

impl RegionResolver {
    /// Creates a resolver with no fixed regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region used for `target` while it has no anchor.
    pub fn set_fixed_region(&mut self, target: TargetId, region: Rect) {
        self.fixed.insert(target, region);
    }

    /// Returns the fixed region registered for `target`.
    pub fn fixed_region(&self, target: &TargetId) -> Option<Rect> {
        self.fixed.get(target).copied()
    }

    /// Resolves the search region of `target`.
    ///
    /// Without a dependency this is the fixed region, or the whole capture.
    /// With one, every anchor up the chain must resolve and the direct anchor
    /// must have a cached match; the result is never replaced by a full-capture
    /// fallback.
    pub fn resolve(
        &self,
        target: &TargetId,
        graph: &RegionDependencyGraph,
        cache: &MatchCache,
    ) -> Result<SearchRegion, ResolutionError> {
        self.resolve_at(target, graph, cache, 0)
    }

    fn resolve_at(
        &self,
        target: &TargetId,
        graph: &RegionDependencyGraph,
        cache: &MatchCache,
        depth: usize,
    ) -> Result<SearchRegion, ResolutionError> {
        if depth > graph.len() {
            return Err(ResolutionError::CyclicDependency {
                target: target.clone(),
            });
        }
        let Some(dep) = graph.dependency(target) else {
            return Ok(self.fixed_region(target).into());
        };

        self.resolve_at(&dep.anchor, graph, cache, depth + 1)?;

        let anchor = cache
            .best(&dep.anchor)
            .ok_or_else(|| ResolutionError::AnchorNotYetFound {
                target: target.clone(),
                anchor: dep.anchor.clone(),
            })?;

        let (x, y, width, height) = dep.offset.apply(anchor.rect);
        let degenerate = || ResolutionError::DegenerateRegion {
            target: target.clone(),
            width,
            height,
        };
        if width <= 0 || height <= 0 {
            return Err(degenerate());
        }
        let rect = Rect::new(
            i32::try_from(x).map_err(|_| degenerate())?,
            i32::try_from(y).map_err(|_| degenerate())?,
            u32::try_from(width).map_err(|_| degenerate())?,
            u32::try_from(height).map_err(|_| degenerate())?,
        );
        Ok(SearchRegion::Area(rect))
    }
}
