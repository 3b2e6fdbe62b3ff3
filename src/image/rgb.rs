//! Canonical 8-bit RGB buffers and borrowed views.
//!
//! `RgbView` is a borrowed 2D window into a pixel slice with an explicit
//! stride, counted in pixels between the starts of consecutive rows. Region
//! views are zero-copy and keep the original stride. Every view also records
//! its origin in the image it was cut from, so positions found inside a region
//! can be reported in absolute capture coordinates.

use crate::geometry::{Rect, Size};
use crate::util::{MatchError, MatchResult};
use std::fmt;

/// One RGB pixel.
pub type Rgb = [u8; 3];

/// Borrowed RGB view with an explicit stride and absolute origin.
#[derive(Copy, Clone, Debug)]
pub struct RgbView<'a> {
    data: &'a [Rgb],
    width: usize,
    height: usize,
    stride: usize,
    origin: (usize, usize),
}

impl<'a> RgbView<'a> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [Rgb], width: usize, height: usize) -> MatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [Rgb], width: usize, height: usize, stride: usize) -> MatchResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(MatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            origin: (0, 0),
        })
    }

    /// Returns the view width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the view height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in pixels between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Top-left corner of this view in the root image.
    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    /// Places this view at `origin` in its root image.
    ///
    /// Used for buffers that hold a pre-cut region rather than a whole image.
    pub(crate) fn with_origin(mut self, origin: (usize, usize)) -> Self {
        self.origin = origin;
        self
    }

    /// Returns the view dimensions, saturated to `u32`.
    pub fn size(&self) -> Size {
        Size::new(saturate(self.width), saturate(self.height))
    }

    /// Returns the pixel at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [Rgb]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Returns a zero-copy view of `rect`, given in this view's coordinates.
    ///
    /// The rectangle must be non-empty and lie entirely inside the view; it is
    /// never clamped.
    pub fn roi(&self, rect: Rect) -> MatchResult<RgbView<'a>> {
        let invalid = MatchError::InvalidRegion {
            region: rect,
            bounds: self.size(),
        };
        if !rect.fits_within(self.size()) {
            return Err(invalid);
        }
        // fits_within guarantees non-negative coordinates.
        let x = rect.x as usize;
        let y = rect.y as usize;
        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x))
            .ok_or(invalid.clone())?;
        let data = self.data.get(start..).ok_or(invalid)?;

        let mut view = RgbView::new(data, rect.width as usize, rect.height as usize, self.stride)?;
        view.origin = (self.origin.0 + x, self.origin.1 + y);
        Ok(view)
    }
}

/// Owned contiguous RGB image.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbImage {
    data: Vec<Rgb>,
    width: usize,
    height: usize,
}

impl RgbImage {
    /// Creates an image from a row-major pixel buffer of exactly `width * height`.
    pub fn new(data: Vec<Rgb>, width: usize, height: usize) -> MatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(MatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(MatchError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(MatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> Rgb,
    ) -> MatchResult<Self> {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(data, width, height)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the image dimensions, saturated to `u32`.
    pub fn size(&self) -> Size {
        Size::new(saturate(self.width), saturate(self.height))
    }

    /// Returns the row-major pixel buffer.
    pub fn pixels(&self) -> &[Rgb] {
        &self.data
    }

    /// Returns a borrowed view of the whole image.
    pub fn view(&self) -> RgbView<'_> {
        RgbView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
            origin: (0, 0),
        }
    }

    /// Copies the pixels into a 24-bit `Image`.
    pub fn to_image(&self) -> crate::image::Image {
        let bytes: Vec<u8> = self.data.iter().flatten().copied().collect();
        crate::image::Image::from_u8(bytes, self.width, self.height, 3)
            .expect("rgb buffer length matches its dimensions")
    }
}

impl fmt::Debug for RgbImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> MatchResult<usize> {
    if width == 0 || height == 0 {
        return Err(MatchError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(MatchError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(MatchError::InvalidDimensions { width, height })
}

fn saturate(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
