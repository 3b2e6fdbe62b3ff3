//! Trackable targets: an identity owning one or more patterns.

use crate::geometry::{Rect, RegionOffset};
use crate::pattern::Pattern;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identity of a trackable target. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(Arc<str>);

impl TargetId {
    /// Creates an identifier from any string.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for TargetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edge payload: the anchor a target's region is derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionDependency {
    pub anchor: TargetId,
    pub offset: RegionOffset,
}

/// A visual target created from configuration at startup.
#[derive(Clone, Debug)]
pub struct TrackableTarget {
    id: TargetId,
    patterns: Vec<Arc<Pattern>>,
    region: Option<Rect>,
    dependency: Option<RegionDependency>,
}

impl TrackableTarget {
    /// Creates a target with no patterns, region or dependency.
    pub fn new(id: impl Into<TargetId>) -> Self {
        Self {
            id: id.into(),
            patterns: Vec::new(),
            region: None,
            dependency: None,
        }
    }

    /// Adds a pattern; patterns are searched in insertion order.
    pub fn with_pattern(mut self, pattern: impl Into<Arc<Pattern>>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Sets the fixed search region used when the target has no anchor.
    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    /// Derives this target's search region from `anchor`'s last match.
    pub fn depends_on(mut self, anchor: impl Into<TargetId>, offset: RegionOffset) -> Self {
        self.dependency = Some(RegionDependency {
            anchor: anchor.into(),
            offset,
        });
        self
    }

    /// Returns the target identifier.
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Returns the patterns tried for this target, in order.
    pub fn patterns(&self) -> &[Arc<Pattern>] {
        &self.patterns
    }

    /// Returns the anchor dependency, if any.
    pub fn dependency(&self) -> Option<&RegionDependency> {
        self.dependency.as_ref()
    }

    /// Fixed search region of an unanchored target. Patterns may still
    /// narrow a full-capture search with their own hints.
    pub fn region(&self) -> Option<Rect> {
        self.region
    }
}
