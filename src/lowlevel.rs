//! Low-level building blocks for custom matching pipelines.
//!
//! These expose the scan kernels, candidate pruning and resampling used by
//! [`PatternMatcher`](crate::PatternMatcher). Coordinates are relative to the
//! view being scanned. Most users should prefer the `Locator` or
//! `PatternMatcher` APIs.

pub use crate::candidate::nms::nms_2d;
pub use crate::candidate::Candidate;
#[cfg(feature = "rayon")]
pub use crate::search::parallel::scan_sad_par;
pub use crate::search::scan::{scan_sad, score_at, score_unnormalized_at};
pub use crate::pattern::resize::{resize_bilinear, scale_pattern, scaled_size};
