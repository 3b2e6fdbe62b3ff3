//! Bilinear rescaling of RGB patterns.
//!
//! Destination pixel centers are mapped back to the source with
//! `src = (dst + 0.5) * (src_len / dst_len) - 0.5`, clamped to the valid
//! range, and the four neighbors are blended per channel. Results are rounded
//! to the nearest integer.

use crate::geometry::{Rect, Size};
use crate::image::{Rgb, RgbImage, RgbView};
use crate::util::math::scaled_len;
use crate::util::{MatchError, MatchResult};

/// Resizes `src` to exactly `width` x `height` with bilinear sampling.
pub fn resize_bilinear(src: RgbView<'_>, width: usize, height: usize) -> MatchResult<RgbImage> {
    if width == 0 || height == 0 {
        return Err(MatchError::InvalidDimensions { width, height });
    }
    let src_w = src.width();
    let src_h = src.height();
    let sx = src_w as f32 / width as f32;
    let sy = src_h as f32 / height as f32;
    let max_x = src_w as f32 - 1.0;
    let max_y = src_h as f32 - 1.0;

    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let src_y = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = src_y - y0 as f32;
        let row0 = src.row(y0).expect("row in bounds");
        let row1 = src.row(y1).expect("row in bounds");

        for x in 0..width {
            let src_x = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = src_x - x0 as f32;

            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;

            let mut px: Rgb = [0; 3];
            for (c, slot) in px.iter_mut().enumerate() {
                let value = row0[x0][c] as f32 * w00
                    + row0[x1][c] as f32 * w10
                    + row1[x0][c] as f32 * w01
                    + row1[x1][c] as f32 * w11;
                *slot = value.round().clamp(0.0, 255.0) as u8;
            }
            out.push(px);
        }
    }

    RgbImage::new(out, width, height)
}

/// Output size for scaling `size` by `factor`.
pub fn scaled_size(size: Size, factor: f32) -> Size {
    let w = scaled_len(size.width as usize, factor);
    let h = scaled_len(size.height as usize, factor);
    Size::new(
        u32::try_from(w).unwrap_or(u32::MAX),
        u32::try_from(h).unwrap_or(u32::MAX),
    )
}

/// Scales a pattern by `factor`.
///
/// A result with zero area is an `InvalidRegion`: a pattern that vanishes
/// cannot be matched and must not produce zero-sized matches.
pub fn scale_pattern(src: RgbView<'_>, factor: f32) -> MatchResult<RgbImage> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(MatchError::InvalidInput("scale factor must be positive"));
    }
    let target = scaled_size(src.size(), factor);
    if target.is_empty() {
        return Err(MatchError::InvalidRegion {
            region: Rect::from_size(target),
            bounds: src.size(),
        });
    }
    resize_bilinear(src, target.width as usize, target.height as usize)
}

#[cfg(test)]
mod tests {
    use super::{resize_bilinear, scale_pattern};
    use crate::geometry::Rect;
    use crate::image::RgbImage;
    use crate::util::MatchError;

    #[test]
    fn identity_resize_preserves_pixels() {
        let img = RgbImage::from_fn(5, 4, |x, y| [(x * 40) as u8, (y * 60) as u8, 7]).unwrap();
        let out = resize_bilinear(img.view(), 5, 4).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn downscale_blends_neighbors() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { [0, 0, 0] } else { [200, 100, 50] })
            .unwrap();
        let out = resize_bilinear(img.view(), 1, 1).unwrap();
        assert_eq!(out.pixels(), &[[100, 50, 25]]);
    }

    #[test]
    fn block_pattern_downscales_cleanly_by_point_eight() {
        let img = RgbImage::from_fn(10, 5, |x, _| if x < 5 { [255, 0, 0] } else { [0, 0, 255] })
            .unwrap();
        let out = scale_pattern(img.view(), 0.8).unwrap();
        assert_eq!((out.width(), out.height()), (8, 4));
        for y in 0..4 {
            let row = out.view().row(y).unwrap();
            assert!(row[..4].iter().all(|p| *p == [255, 0, 0]));
            assert!(row[4..].iter().all(|p| *p == [0, 0, 255]));
        }
    }

    #[test]
    fn vanishing_pattern_is_invalid_region() {
        let img = RgbImage::from_fn(2, 2, |_, _| [1, 2, 3]).unwrap();
        let err = scale_pattern(img.view(), 0.1).unwrap_err();
        assert!(matches!(err, MatchError::InvalidRegion { region, .. } if region == Rect::new(0, 0, 0, 0)));
    }
}
