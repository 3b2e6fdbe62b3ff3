//! Pixel-space geometry shared by the matcher, cache and resolver.
//!
//! Coordinates are capture pixels. Rectangle origins are signed because a
//! region derived from an anchor plus an offset may start left of or above the
//! capture; extents are unsigned, so a rectangle can never have negative size.

use std::fmt;

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Creates a size of `width` by `height` pixels.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `width * height`.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in capture coordinates.
///
/// A zero-area rectangle is a valid value (the "nothing here" sentinel); it is
/// never produced for a successful match or a resolved region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle at `(x, y)` of `width` by `height`.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering an image of `size` anchored at the origin.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Returns true when either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the width and height.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns `width * height`.
    pub fn area(&self) -> u64 {
        self.size().area()
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Center point, rounded toward the origin.
    pub fn center(&self) -> (i64, i64) {
        (
            i64::from(self.x) + i64::from(self.width / 2),
            i64::from(self.y) + i64::from(self.height / 2),
        )
    }

    /// Returns true when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(
            x,
            y,
            u32::try_from(right - i64::from(x)).unwrap_or(u32::MAX),
            u32::try_from(bottom - i64::from(y)).unwrap_or(u32::MAX),
        )
    }

    /// Returns true when the rectangle is non-empty and inside an image of `size`.
    pub fn fits_within(&self, size: Size) -> bool {
        !self.is_empty() && Rect::from_size(size).contains(self)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{},{}]", self.x, self.y, self.width, self.height)
    }
}

/// Additive adjustment applied to an anchor's match rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegionOffset {
    pub add_x: i32,
    pub add_y: i32,
    pub add_w: i32,
    pub add_h: i32,
}

impl RegionOffset {
    /// Creates an offset from its four additive terms.
    pub const fn new(add_x: i32, add_y: i32, add_w: i32, add_h: i32) -> Self {
        Self {
            add_x,
            add_y,
            add_w,
            add_h,
        }
    }

    /// Applies the offset, returning `(x, y, width, height)` without any
    /// validation. Widths and heights may come out zero or negative.
    pub fn apply(&self, anchor: Rect) -> (i64, i64, i64, i64) {
        (
            i64::from(anchor.x) + i64::from(self.add_x),
            i64::from(anchor.y) + i64::from(self.add_y),
            i64::from(anchor.width) + i64::from(self.add_w),
            i64::from(anchor.height) + i64::from(self.add_h),
        )
    }
}

/// Area a search is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchRegion {
    /// The whole capture.
    Full,
    /// An absolute rectangle inside the capture.
    Area(Rect),
}

impl SearchRegion {
    /// Returns the rectangle, or `None` for the full capture.
    pub fn as_rect(&self) -> Option<Rect> {
        match self {
            SearchRegion::Full => None,
            SearchRegion::Area(rect) => Some(*rect),
        }
    }

    /// Concrete rectangle for a capture of `size`.
    pub fn to_rect(&self, size: Size) -> Rect {
        match self {
            SearchRegion::Full => Rect::from_size(size),
            SearchRegion::Area(rect) => *rect,
        }
    }
}

impl From<Option<Rect>> for SearchRegion {
    fn from(value: Option<Rect>) -> Self {
        value.map_or(SearchRegion::Full, SearchRegion::Area)
    }
}

#[cfg(test)]
mod tests {
    use super::{Rect, RegionOffset, SearchRegion, Size};

    #[test]
    fn rect_containment_respects_edges() {
        let outer = Rect::new(0, 0, 10, 10);
        assert!(outer.contains(&Rect::new(0, 0, 10, 10)));
        assert!(outer.contains(&Rect::new(9, 9, 1, 1)));
        assert!(!outer.contains(&Rect::new(9, 9, 2, 1)));
        assert!(!outer.contains(&Rect::new(-1, 0, 2, 2)));
    }

    #[test]
    fn empty_rect_never_fits() {
        assert!(!Rect::new(0, 0, 0, 5).fits_within(Size::new(10, 10)));
        assert!(Rect::new(2, 3, 4, 5).fits_within(Size::new(10, 10)));
    }

    #[test]
    fn union_covers_both_rects() {
        let a = Rect::new(2, 8, 4, 4);
        let b = Rect::new(10, 1, 3, 2);
        assert_eq!(a.union(&b), Rect::new(2, 1, 11, 11));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn offset_apply_keeps_negative_extents() {
        let offset = RegionOffset::new(-5, 2, -20, 0);
        let (x, y, w, h) = offset.apply(Rect::new(3, 4, 10, 6));
        assert_eq!((x, y, w, h), (-2, 6, -10, 6));
    }

    #[test]
    fn full_region_expands_to_capture() {
        let size = Size::new(64, 32);
        assert_eq!(SearchRegion::Full.to_rect(size), Rect::new(0, 0, 64, 32));
        assert_eq!(SearchRegion::from(None), SearchRegion::Full);
    }
}
