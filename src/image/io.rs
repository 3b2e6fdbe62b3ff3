//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Decoded images keep their
//! native layout and bit depth; conversion to RGB happens in the normalizer so
//! format problems surface there instead of being papered over at load time.

use crate::image::Image;
use crate::util::{MatchError, MatchResult};
use image::DynamicImage;
use std::path::Path;

/// Converts a decoded image without changing its layout or depth.
///
/// Float images have no counterpart and are rejected.
pub fn image_from_dynamic(img: &DynamicImage) -> MatchResult<Image> {
    match img {
        DynamicImage::ImageLuma8(buf) => from_u8(buf.as_raw(), buf.width(), buf.height(), 1),
        DynamicImage::ImageLumaA8(buf) => from_u8(buf.as_raw(), buf.width(), buf.height(), 2),
        DynamicImage::ImageRgb8(buf) => from_u8(buf.as_raw(), buf.width(), buf.height(), 3),
        DynamicImage::ImageRgba8(buf) => from_u8(buf.as_raw(), buf.width(), buf.height(), 4),
        DynamicImage::ImageLuma16(buf) => from_u16(buf.as_raw(), buf.width(), buf.height(), 1),
        DynamicImage::ImageLumaA16(buf) => from_u16(buf.as_raw(), buf.width(), buf.height(), 2),
        DynamicImage::ImageRgb16(buf) => from_u16(buf.as_raw(), buf.width(), buf.height(), 3),
        DynamicImage::ImageRgba16(buf) => from_u16(buf.as_raw(), buf.width(), buf.height(), 4),
        DynamicImage::ImageRgb32F(_) => Err(MatchError::UnsupportedPixelFormat {
            channels: 3,
            bits: 32,
        }),
        DynamicImage::ImageRgba32F(_) => Err(MatchError::UnsupportedPixelFormat {
            channels: 4,
            bits: 32,
        }),
        other => Err(MatchError::UnsupportedPixelFormat {
            channels: usize::from(other.color().channel_count()),
            bits: (other.color().bits_per_pixel() / u16::from(other.color().channel_count().max(1)))
                .min(u16::from(u8::MAX)) as u8,
        }),
    }
}

/// Loads an image from disk in its native format.
pub fn load_image<P: AsRef<Path>>(path: P) -> MatchResult<Image> {
    let img = image::open(path).map_err(|err| MatchError::ImageIo {
        reason: err.to_string(),
    })?;
    image_from_dynamic(&img)
}

fn from_u8(data: &[u8], width: u32, height: u32, channels: usize) -> MatchResult<Image> {
    Image::from_u8(data.to_vec(), width as usize, height as usize, channels)
}

fn from_u16(data: &[u16], width: u32, height: u32, channels: usize) -> MatchResult<Image> {
    Image::from_u16(data.to_vec(), width as usize, height as usize, channels)
}
