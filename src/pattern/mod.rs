//! Reference patterns and their lazily normalized form.

use crate::geometry::{Rect, Size};
use crate::image::normalize::FormatNormalizer;
use crate::image::{Image, Rgb, RgbImage};
use crate::util::MatchResult;
use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

pub mod resize;

/// A named reference image used as a template.
///
/// Patterns are built at configuration time and read-only afterwards. The
/// normalized RGB form is computed on first use and cached in a `OnceLock`
/// together with the background it was composited over, so a pattern shared
/// across threads is converted at most once per locator.
#[derive(Clone, Debug)]
pub struct Pattern {
    name: Arc<str>,
    image: Image,
    min_similarity: Option<f32>,
    region_hint: Option<Rect>,
    native_resolution: Option<Size>,
    normalized: OnceLock<(Rgb, RgbImage)>,
}

impl Pattern {
    /// Creates a pattern with no threshold, hint or native resolution.
    pub fn new(name: impl AsRef<str>, image: Image) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            image,
            min_similarity: None,
            region_hint: None,
            native_resolution: None,
            normalized: OnceLock::new(),
        }
    }

    /// Overrides the configured default minimum similarity.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    /// Restricts unanchored searches to `region`.
    pub fn with_region_hint(mut self, region: Rect) -> Self {
        self.region_hint = Some(region);
        self
    }

    /// Screen resolution the pattern was captured at.
    pub fn with_native_resolution(mut self, resolution: Size) -> Self {
        self.native_resolution = Some(resolution);
        self
    }

    /// Returns the pattern name reported in matches.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the image as loaded, before normalization.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the per-pattern threshold, if one was set.
    pub fn min_similarity(&self) -> Option<f32> {
        self.min_similarity
    }

    /// Returns the region unanchored searches are limited to.
    pub fn region_hint(&self) -> Option<Rect> {
        self.region_hint
    }

    /// Returns the resolution the pattern was captured at.
    pub fn native_resolution(&self) -> Option<Size> {
        self.native_resolution
    }

    /// Returns the normalized RGB form, converting on first use.
    ///
    /// Only the first background seen is cached. A normalizer with a different
    /// background gets a freshly converted, owned image.
    pub fn normalized(&self, normalizer: &FormatNormalizer) -> MatchResult<Cow<'_, RgbImage>> {
        let background = normalizer.background();
        if let Some((cached_bg, rgb)) = self.normalized.get() {
            return Ok(if *cached_bg == background {
                Cow::Borrowed(rgb)
            } else {
                Cow::Owned(normalizer.normalize(&self.image)?)
            });
        }
        let rgb = normalizer.normalize(&self.image)?;
        let (cached_bg, cached) = self.normalized.get_or_init(|| (background, rgb));
        if *cached_bg == background {
            return Ok(Cow::Borrowed(cached));
        }
        // Another thread cached a different background first.
        normalizer.normalize(&self.image).map(Cow::Owned)
    }
}
