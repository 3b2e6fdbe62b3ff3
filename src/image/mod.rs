//! Raw images as produced by capture backends and pattern loaders, and the
//! canonical RGB form the matcher works on.
//!
//! An `Image` keeps whatever layout its producer handed over: grayscale, RGB,
//! RGBA or palette indices, at 8 or 16 bits per sample. It is immutable once
//! built. `normalize` turns any recognized layout into an `RgbImage`, whose
//! `RgbView` windows are what the scan kernels read.

use crate::geometry::Size;
use crate::util::{MatchError, MatchResult};
use std::fmt;

#[cfg(feature = "image-io")]
pub mod io;
pub mod normalize;
mod rgb;

pub use rgb::{Rgb, RgbImage, RgbView};

/// Bits per channel sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Returns the number of bits per sample.
    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }
}

/// Recognized channel layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Gray,
    Rgb,
    Rgba,
    Indexed,
}

#[derive(Clone)]
pub(crate) enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

/// Immutable pixel grid with its native channel layout and bit depth.
#[derive(Clone)]
pub struct Image {
    width: usize,
    height: usize,
    channels: usize,
    samples: Samples,
    palette: Option<Vec<Rgb>>,
}

impl Image {
    /// Creates an image from interleaved 8-bit samples.
    ///
    /// Any channel count is accepted here; unrecognized layouts are reported
    /// when the image is normalized. Zero-sized images are allowed and model
    /// a blank capture.
    pub fn from_u8(data: Vec<u8>, width: usize, height: usize, channels: usize) -> MatchResult<Self> {
        check_len(data.len(), width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            samples: Samples::U8(data),
            palette: None,
        })
    }

    /// Creates an image from interleaved 16-bit samples.
    pub fn from_u16(
        data: Vec<u16>,
        width: usize,
        height: usize,
        channels: usize,
    ) -> MatchResult<Self> {
        check_len(data.len(), width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            samples: Samples::U16(data),
            palette: None,
        })
    }

    /// Creates a palette-indexed image with one 8-bit index per pixel.
    pub fn indexed(
        indices: Vec<u8>,
        palette: Vec<Rgb>,
        width: usize,
        height: usize,
    ) -> MatchResult<Self> {
        if palette.is_empty() {
            return Err(MatchError::InvalidInput("empty palette"));
        }
        check_len(indices.len(), width, height, 1)?;
        Ok(Self {
            width,
            height,
            channels: 1,
            samples: Samples::U8(indices),
            palette: Some(palette),
        })
    }

    /// 8-bit grayscale image.
    pub fn gray(data: Vec<u8>, width: usize, height: usize) -> MatchResult<Self> {
        Self::from_u8(data, width, height, 1)
    }

    /// 24-bit RGB image.
    pub fn rgb(data: Vec<u8>, width: usize, height: usize) -> MatchResult<Self> {
        Self::from_u8(data, width, height, 3)
    }

    /// 32-bit RGBA image.
    pub fn rgba(data: Vec<u8>, width: usize, height: usize) -> MatchResult<Self> {
        Self::from_u8(data, width, height, 4)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions as a `Size`, saturating at `u32::MAX`.
    pub fn size(&self) -> Size {
        Size::new(
            u32::try_from(self.width).unwrap_or(u32::MAX),
            u32::try_from(self.height).unwrap_or(u32::MAX),
        )
    }

    /// Returns true when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Samples per pixel in the stored buffer (1 for indexed images).
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the sample width of the stored buffer.
    pub fn bit_depth(&self) -> BitDepth {
        match self.samples {
            Samples::U8(_) => BitDepth::Eight,
            Samples::U16(_) => BitDepth::Sixteen,
        }
    }

    /// Returns the layout, or `None` for an unrecognized channel count.
    pub fn layout(&self) -> Option<PixelLayout> {
        if self.palette.is_some() {
            return Some(PixelLayout::Indexed);
        }
        match self.channels {
            1 => Some(PixelLayout::Gray),
            3 => Some(PixelLayout::Rgb),
            4 => Some(PixelLayout::Rgba),
            _ => None,
        }
    }

    /// Returns the palette of an indexed image.
    pub fn palette(&self) -> Option<&[Rgb]> {
        self.palette.as_deref()
    }

    /// Returns the 8-bit sample buffer, if the image stores 8-bit samples.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.samples {
            Samples::U8(data) => Some(data),
            Samples::U16(_) => None,
        }
    }

    pub(crate) fn samples(&self) -> &Samples {
        &self.samples
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bit_depth", &self.bit_depth())
            .field("layout", &self.layout())
            .finish()
    }
}

fn check_len(got: usize, width: usize, height: usize, channels: usize) -> MatchResult<()> {
    if channels == 0 {
        return Err(MatchError::InvalidInput("channel count must be positive"));
    }
    let needed = width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .ok_or(MatchError::InvalidDimensions { width, height })?;
    if got != needed {
        return Err(MatchError::BufferTooSmall { needed, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BitDepth, Image, PixelLayout};
    use crate::util::MatchError;

    #[test]
    fn layouts_follow_channel_count() {
        let gray = Image::gray(vec![0; 4], 2, 2).unwrap();
        let rgba = Image::rgba(vec![0; 16], 2, 2).unwrap();
        let odd = Image::from_u8(vec![0; 8], 2, 2, 2).unwrap();
        assert_eq!(gray.layout(), Some(PixelLayout::Gray));
        assert_eq!(rgba.layout(), Some(PixelLayout::Rgba));
        assert_eq!(odd.layout(), None);
    }

    #[test]
    fn indexed_images_report_indexed_layout() {
        let img = Image::indexed(vec![0, 1, 1, 0], vec![[0, 0, 0], [9, 9, 9]], 2, 2).unwrap();
        assert_eq!(img.layout(), Some(PixelLayout::Indexed));
        assert_eq!(img.channels(), 1);
    }

    #[test]
    fn sixteen_bit_depth_is_tracked() {
        let img = Image::from_u16(vec![0; 6], 2, 1, 3).unwrap();
        assert_eq!(img.bit_depth(), BitDepth::Sixteen);
        assert!(img.as_u8().is_none());
    }

    #[test]
    fn buffer_length_is_validated() {
        let err = Image::rgb(vec![0; 5], 1, 2).unwrap_err();
        assert_eq!(err, MatchError::BufferTooSmall { needed: 6, got: 5 });
    }

    #[test]
    fn blank_capture_is_representable() {
        let img = Image::rgb(Vec::new(), 0, 0).unwrap();
        assert!(img.is_empty());
        assert_eq!(img.size().width, 0);
    }
}
