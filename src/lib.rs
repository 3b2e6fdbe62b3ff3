//! anchormatch locates UI elements in screen captures.
//!
//! Patterns are matched with a sum-of-absolute-differences similarity after
//! both images are normalized to 8-bit RGB and the pattern is rescaled by an
//! explicit scale factor. Targets can be anchored on other targets: their
//! search region is derived from the anchor's last match plus an offset, and
//! is recomputed from the match cache every time it is needed.
//!
//! Row-parallel scanning is available with the `rayon` feature, image file
//! loading with `image-io` and `tracing` spans with `tracing`.

pub mod cache;
mod candidate;
pub mod capture;
pub mod geometry;
pub mod graph;
pub mod image;
pub mod locator;
pub mod lowlevel;
pub mod pattern;
pub mod scale;
pub mod search;
pub mod target;
mod trace;
pub mod util;

pub use cache::{MatchCache, SearchState};
pub use capture::{CaptureSource, FrameSequence, StillCapture};
#[cfg(feature = "image-io")]
pub use capture::FileCapture;
pub use geometry::{Rect, RegionOffset, SearchRegion, Size};
pub use graph::{RegionDependencyGraph, RegionResolver};
pub use image::normalize::{are_formats_compatible, normalize, FormatNormalizer};
pub use image::{BitDepth, Image, PixelLayout, RgbImage, RgbView};
pub use locator::{Locator, LocatorConfig};
pub use pattern::Pattern;
pub use scale::{
    Calibration, CalibrationOutcome, CandidateScore, DisplayMetrics, DisplayMetricsSource,
    ScaleConfig, ScaleEstimator, ScaleFactor, ScaleHint,
};
pub use search::{
    CancelToken, Match, MatchConfig, MatchRequest, PatternMatcher, SearchControl,
    DEFAULT_MIN_SIMILARITY,
};
pub use target::{RegionDependency, TargetId, TrackableTarget};
pub use util::{GraphError, LocateError, MatchError, MatchResult, ResolutionError};
