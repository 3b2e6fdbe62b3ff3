//! Error types for anchormatch.
//!
//! Matching, graph registration and region resolution fail in different ways
//! and callers react to them differently, so each has its own enum.
//! `LocateError` joins them for the `Locator` facade.

use crate::geometry::{Rect, Size};
use crate::target::TargetId;
use thiserror::Error;

/// Result alias for image and matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors raised while normalizing, scaling or scanning images.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MatchError {
    /// The channel layout or bit depth is outside the recognized set.
    #[error("unsupported pixel format: {channels} channel(s) at {bits} bits")]
    UnsupportedPixelFormat { channels: usize, bits: u8 },
    /// A search region is empty or not inside the capture, or the scaled
    /// pattern has zero area.
    #[error("invalid region {region} for bounds {bounds}")]
    InvalidRegion { region: Rect, bounds: Size },
    /// The search deadline passed before the scan finished.
    #[error("search timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    /// The search was cancelled by the caller.
    #[error("search cancelled")]
    Cancelled,
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The sample buffer does not match the declared dimensions.
    #[error("buffer length mismatch: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Image decoding or file access failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}

/// Errors raised when registering region dependencies.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    /// The edge would make a target (transitively) depend on itself.
    #[error("dependency {target} -> {anchor} would create a cycle")]
    CyclicDependency { target: TargetId, anchor: TargetId },
    /// The target or anchor is not registered.
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
}

/// Errors raised when computing a target's search region.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResolutionError {
    /// The anchor has not been searched yet or its last search found nothing.
    #[error("anchor {anchor} of {target} has no current match")]
    AnchorNotYetFound { target: TargetId, anchor: TargetId },
    /// The anchor match plus offset yields a non-positive width or height.
    #[error("region for {target} is degenerate ({width}x{height})")]
    DegenerateRegion {
        target: TargetId,
        width: i64,
        height: i64,
    },
    /// The dependency chain loops back on itself.
    #[error("dependency chain of {target} is cyclic")]
    CyclicDependency { target: TargetId },
    /// The target is not registered.
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
}

/// Errors surfaced by the `Locator` facade.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LocateError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// The target is not registered.
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
    /// A target with this id was already added.
    #[error("duplicate target {0}")]
    DuplicateTarget(TargetId),
}

impl LocateError {
    /// Returns true for the "search the anchor first, then retry" case.
    pub fn is_anchor_pending(&self) -> bool {
        matches!(
            self,
            LocateError::Resolution(ResolutionError::AnchorNotYetFound { .. })
        )
    }
}
