//! Rectangle types.
//!
//! Detections, tracking regions and the output rect packets are all expressed with these. Most
//! geometry happens in pixel space (so that rotations are not distorted by non-square frames) and
//! is converted to normalized frame coordinates with [`RotatedRect::normalize`] at the edges.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use crate::resolution::{AspectRatio, Resolution};

/// 2D vector / point type used by the rectangle types.
pub type Vec2 = Vector2<f32>;

/// A tracking region of interest.
///
/// Regions are [`RotatedRect`]s in normalized frame coordinates: the frame spans `0.0..=1.0` on
/// both axes, and the rotation is measured in pixel space.
pub type Region = RotatedRect;

/// An axis-aligned rectangle.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vec2,
    size: Vec2,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vec2::new(x_center, y_center),
            size: Vec2::new(width, height),
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Computes the (axis-aligned) bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = T>, T: Into<Vec2>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let first: Vec2 = iter.next()?.into();
        let (mut min, mut max) = (first, first);
        for pt in iter {
            let pt = pt.into();
            min = min.inf(&pt);
            max = max.sup(&pt);
        }

        Some(Self::from_top_left(
            min.x,
            min.y,
            max.x - min.x,
            max.y - min.y,
        ))
    }

    /// Scales the width and height of this [`Rect`] by the given amount, keeping its center.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangles width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * (1.0 + 2.0 * amount),
        }
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target_aspect.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target_aspect.as_f32();
        }
        res
    }

    #[inline]
    pub fn top_left(&self) -> Vec2 {
        self.center - self.size * 0.5
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = (self.top_left() + self.size).inf(&(other.top_left() + other.size));
        if min.x > max.x || min.y > max.y {
            return None;
        }

        Rect::bounding([min, max])
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        self.intersection(other).map_or(0.0, |rect| rect.area())
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    ///
    /// Two empty rectangles have an IoU of 0.0.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Returns whether `point` lies inside `self` or on its edge.
    ///
    /// An empty rectangle still contains its center.
    pub fn contains_point(&self, point: impl Into<Vec2>) -> bool {
        let p: Vec2 = point.into();
        self.x() <= p.x
            && self.y() <= p.y
            && self.x() + self.width() >= p.x
            && self.y() + self.height() >= p.y
    }

    /// Returns the corners in order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        let [x, y] = [self.x(), self.y()];
        let [w, h] = [self.width(), self.height()];
        [
            Vec2::new(x, y),
            Vec2::new(x + w, y),
            Vec2::new(x + w, y + h),
            Vec2::new(x, y + h),
        ]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.center.x, self.center.y, self.size.x, self.size.y
        )
    }
}

/// A [`Rect`], rotated clockwise around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the clockwise rotation to apply to the [`Rect`].
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the smallest rectangle with the given rotation that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<T: Into<Vec2>, I: IntoIterator<Item = T>>(
        radians: f32,
        points: I,
    ) -> Option<Self> {
        // Undo the rotation, take the axis-aligned bounds, then rotate the center back. Rotating
        // around the origin is fine since only the center is mapped back.
        let unrotate = Rotation2::new(-radians);
        let aligned = Rect::bounding(points.into_iter().map(|p| unrotate * p.into()))?;
        let center = Rotation2::new(radians) * aligned.center();

        Some(Self::new(
            Rect::from_center(center.x, center.y, aligned.width(), aligned.height()),
            radians,
        ))
    }

    /// Returns the rectangle's clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.rect.height()
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    /// Symmetrically extends one dimension of `self` so that it has the given aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target_aspect))
    }

    /// Returns the rotated rectangle's corners in the parent's coordinate system.
    ///
    /// The order is: top-left, top-right, bottom-right, bottom-left, as seen from the non-rotated
    /// rect.
    pub fn rotated_corners(&self) -> [Vec2; 4] {
        let rot = Rotation2::new(self.radians);
        let center = self.rect.center();
        self.rect.corners().map(|p| center + rot * (p - center))
    }

    /// Returns the axis-aligned [`Rect`] enclosing the rotated rectangle.
    pub fn bounding_rect(&self) -> Rect {
        // Never `None`, there are always 4 corners.
        Rect::bounding(self.rotated_corners()).unwrap_or(self.rect)
    }

    /// Transforms a point from the parent coordinate system into the [`RotatedRect`]'s system.
    ///
    /// The origin of the inner coordinate system is the top left corner of the rectangle.
    pub fn transform_in(&self, pt: impl Into<Vec2>) -> Vec2 {
        let half = self.rect.size() * 0.5;
        let rel = pt.into() - self.rect.center();
        Rotation2::new(-self.radians) * rel + half
    }

    /// Transforms a point from the [`RotatedRect`]'s coordinate system to the parent system.
    ///
    /// The origin of the inner coordinate system is the top left corner of the rectangle.
    pub fn transform_out(&self, pt: impl Into<Vec2>) -> Vec2 {
        let half = self.rect.size() * 0.5;
        Rotation2::new(self.radians) * (pt.into() - half) + self.rect.center()
    }

    /// Converts a normalized rectangle to pixel coordinates of a frame with resolution `res`.
    pub fn denormalize(&self, res: Resolution) -> Self {
        let scale = Vec2::new(res.width() as f32, res.height() as f32);
        self.scale_components(scale)
    }

    /// Converts a rectangle in pixel coordinates of a frame with resolution `res` to normalized
    /// coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `res` has a width or height of 0.
    pub fn normalize(&self, res: Resolution) -> Self {
        assert!(!res.is_empty(), "cannot normalize to empty resolution {res}");
        let scale = Vec2::new(1.0 / res.width() as f32, 1.0 / res.height() as f32);
        self.scale_components(scale)
    }

    fn scale_components(&self, scale: Vec2) -> Self {
        let center = self.rect.center().component_mul(&scale);
        let size = self.rect.size().component_mul(&scale);
        Self::new(
            Rect::from_center(center.x, center.y, size.x, size.y),
            self.radians,
        )
    }

    /// Returns `[center_x, center_y, width, height, rotation]`, the layout used by the rect
    /// output packets.
    pub fn to_array(&self) -> [f32; 5] {
        let c = self.center();
        [c.x, c.y, self.width(), self.height(), self.radians]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}
