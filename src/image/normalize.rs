//! Format normalization ahead of matching.
//!
//! A stored pattern and a live capture often disagree on alpha, bit depth or
//! palette; compared byte for byte they score far lower than their visual
//! similarity warrants. Everything is converted to 8-bit RGB first:
//!
//! - grayscale is replicated into all three channels,
//! - RGBA is composited over an opaque background color,
//! - indexed pixels are looked up in the palette,
//! - 16-bit samples keep their high byte.
//!
//! Any other channel layout is reported as `UnsupportedPixelFormat`.

use crate::geometry::Rect;
use crate::image::{BitDepth, Image, PixelLayout, Rgb, RgbImage, Samples};
use crate::util::{MatchError, MatchResult};

/// Mid-gray background used when compositing alpha.
pub const NEUTRAL_BACKGROUND: Rgb = [128, 128, 128];

/// Converts images into the canonical RGB form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatNormalizer {
    background: Rgb,
}

impl Default for FormatNormalizer {
    fn default() -> Self {
        Self {
            background: NEUTRAL_BACKGROUND,
        }
    }
}

impl FormatNormalizer {
    /// Uses `background` behind translucent pixels.
    pub fn with_background(background: Rgb) -> Self {
        Self { background }
    }

    /// Returns the color translucent pixels are composited over.
    pub fn background(&self) -> Rgb {
        self.background
    }

    /// Converts `image` to 8-bit RGB.
    pub fn normalize(&self, image: &Image) -> MatchResult<RgbImage> {
        let pixels = self.convert_window(image, 0, 0, image.width(), image.height())?;
        RgbImage::new(pixels, image.width(), image.height())
    }

    /// Converts only the pixels inside `region`.
    ///
    /// The result is `region`-sized; its pixel `(0, 0)` is the capture pixel
    /// at `(region.x, region.y)`. Cost is proportional to the region's area.
    pub fn normalize_region(&self, image: &Image, region: Rect) -> MatchResult<RgbImage> {
        if !region.fits_within(image.size()) {
            return Err(MatchError::InvalidRegion {
                region,
                bounds: image.size(),
            });
        }
        // fits_within guarantees non-negative coordinates.
        let (x0, y0) = (region.x as usize, region.y as usize);
        let (width, height) = (region.width as usize, region.height as usize);
        let pixels = self.convert_window(image, x0, y0, width, height)?;
        RgbImage::new(pixels, width, height)
    }

    fn convert_window(
        &self,
        image: &Image,
        x0: usize,
        y0: usize,
        width: usize,
        height: usize,
    ) -> MatchResult<Vec<Rgb>> {
        let layout = image.layout().ok_or(MatchError::UnsupportedPixelFormat {
            channels: image.channels(),
            bits: image.bit_depth().bits(),
        })?;
        let channels = image.channels();
        let row_span = |y: usize| {
            let start = (y * image.width() + x0) * channels;
            start..start + width * channels
        };

        let mut out = Vec::with_capacity(width.saturating_mul(height));
        match image.samples() {
            Samples::U8(data) => {
                for y in y0..y0 + height {
                    self.convert(layout, image, &data[row_span(y)], |v| v, &mut out)?;
                }
            }
            Samples::U16(data) => {
                if layout == PixelLayout::Indexed {
                    return Err(MatchError::UnsupportedPixelFormat {
                        channels: 1,
                        bits: BitDepth::Sixteen.bits(),
                    });
                }
                for y in y0..y0 + height {
                    self.convert(layout, image, &data[row_span(y)], |v| (v >> 8) as u8, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    /// Appends the RGB form of a run of whole pixels to `out`.
    fn convert<S: Copy>(
        &self,
        layout: PixelLayout,
        image: &Image,
        data: &[S],
        to_u8: impl Fn(S) -> u8,
        out: &mut Vec<Rgb>,
    ) -> MatchResult<()> {
        match layout {
            PixelLayout::Gray => out.extend(data.iter().map(|&v| {
                let g = to_u8(v);
                [g, g, g]
            })),
            PixelLayout::Rgb => out.extend(
                data.chunks_exact(3)
                    .map(|c| [to_u8(c[0]), to_u8(c[1]), to_u8(c[2])]),
            ),
            PixelLayout::Rgba => out.extend(data.chunks_exact(4).map(|c| {
                let a = to_u8(c[3]);
                [
                    composite(to_u8(c[0]), a, self.background[0]),
                    composite(to_u8(c[1]), a, self.background[1]),
                    composite(to_u8(c[2]), a, self.background[2]),
                ]
            })),
            PixelLayout::Indexed => {
                let palette = image
                    .palette()
                    .ok_or(MatchError::InvalidInput("indexed image without palette"))?;
                for &v in data {
                    let color = palette
                        .get(usize::from(to_u8(v)))
                        .ok_or(MatchError::InvalidInput("palette index out of range"))?;
                    out.push(*color);
                }
            }
        }
        Ok(())
    }
}

/// Normalizes with the default neutral background.
pub fn normalize(image: &Image) -> MatchResult<RgbImage> {
    FormatNormalizer::default().normalize(image)
}

/// Returns true when `a` and `b` can be compared sample for sample without
/// normalization: same layout and same bit depth.
pub fn are_formats_compatible(a: &Image, b: &Image) -> bool {
    match (a.layout(), b.layout()) {
        (Some(la), Some(lb)) => la == lb && a.bit_depth() == b.bit_depth(),
        _ => false,
    }
}

fn composite(color: u8, alpha: u8, background: u8) -> u8 {
    let a = u32::from(alpha);
    let value = u32::from(color) * a + u32::from(background) * (255 - a);
    ((value + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::{are_formats_compatible, composite, normalize, FormatNormalizer};
    use crate::geometry::{Rect, Size};
    use crate::image::Image;
    use crate::util::MatchError;

    #[test]
    fn opaque_rgba_matches_rgb() {
        let rgb = Image::rgb(vec![10, 20, 30, 200, 100, 0], 2, 1).unwrap();
        let rgba = Image::rgba(vec![10, 20, 30, 255, 200, 100, 0, 255], 2, 1).unwrap();
        assert_eq!(normalize(&rgb).unwrap(), normalize(&rgba).unwrap());
    }

    #[test]
    fn transparent_pixels_take_background() {
        let rgba = Image::rgba(vec![255, 0, 0, 0], 1, 1).unwrap();
        let out = FormatNormalizer::with_background([1, 2, 3])
            .normalize(&rgba)
            .unwrap();
        assert_eq!(out.pixels(), &[[1, 2, 3]]);
        assert_eq!(composite(200, 128, 0), 100);
    }

    #[test]
    fn gray_and_sixteen_bit_are_expanded() {
        let gray = Image::gray(vec![7, 250], 2, 1).unwrap();
        assert_eq!(normalize(&gray).unwrap().pixels(), &[[7, 7, 7], [250, 250, 250]]);

        let deep = Image::from_u16(vec![0xFF00, 0x0100, 0x8080], 1, 1, 3).unwrap();
        assert_eq!(normalize(&deep).unwrap().pixels(), &[[0xFF, 0x01, 0x80]]);
    }

    #[test]
    fn indexed_pixels_use_palette() {
        let img = Image::indexed(vec![1, 0], vec![[1, 1, 1], [9, 8, 7]], 2, 1).unwrap();
        assert_eq!(normalize(&img).unwrap().pixels(), &[[9, 8, 7], [1, 1, 1]]);

        let bad = Image::indexed(vec![5], vec![[0, 0, 0]], 1, 1).unwrap();
        assert_eq!(
            normalize(&bad).unwrap_err(),
            MatchError::InvalidInput("palette index out of range")
        );
    }

    #[test]
    fn unknown_layout_is_surfaced() {
        let gray_alpha = Image::from_u8(vec![0; 4], 2, 1, 2).unwrap();
        assert_eq!(
            normalize(&gray_alpha).unwrap_err(),
            MatchError::UnsupportedPixelFormat {
                channels: 2,
                bits: 8
            }
        );
    }

    #[test]
    fn compatibility_requires_layout_and_depth() {
        let rgb8 = Image::rgb(vec![0; 3], 1, 1).unwrap();
        let rgb8b = Image::rgb(vec![1; 3], 1, 1).unwrap();
        let rgba8 = Image::rgba(vec![0; 4], 1, 1).unwrap();
        let rgb16 = Image::from_u16(vec![0; 3], 1, 1, 3).unwrap();
        assert!(are_formats_compatible(&rgb8, &rgb8b));
        assert!(!are_formats_compatible(&rgb8, &rgba8));
        assert!(!are_formats_compatible(&rgb8, &rgb16));
    }

    #[test]
    fn region_normalization_matches_full_crop() {
        let data: Vec<u8> = (0..6 * 5).flat_map(|i| [i as u8, (i * 3) as u8, 7, 200]).collect();
        let rgba = Image::rgba(data, 6, 5).unwrap();
        let norm = FormatNormalizer::default();
        let full = norm.normalize(&rgba).unwrap();
        let part = norm.normalize_region(&rgba, Rect::new(2, 1, 3, 4)).unwrap();
        assert_eq!((part.width(), part.height()), (3, 4));
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(part.view().get(x, y), full.view().get(x + 2, y + 1));
            }
        }
    }

    #[test]
    fn region_outside_image_is_rejected() {
        let gray = Image::gray(vec![0; 16], 4, 4).unwrap();
        assert_eq!(
            FormatNormalizer::default()
                .normalize_region(&gray, Rect::new(3, 0, 2, 2))
                .unwrap_err(),
            MatchError::InvalidRegion {
                region: Rect::new(3, 0, 2, 2),
                bounds: Size::new(4, 4),
            }
        );
    }
}
