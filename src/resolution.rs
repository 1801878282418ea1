//! Frame dimensions.

use std::fmt;

/// Resolution (`width x height`) of a frame, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns whether either dimension is 0. Frames of this size are rejected at admission.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the ratio of width to height, or `None` for an empty resolution.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Width of a rectangle divided by its height.
///
/// Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio(f32);

impl AspectRatio {
    /// Regions of interest handed to the landmark network are square.
    pub const SQUARE: Self = Self(1.0);

    /// Returns `None` if `width` or `height` is 0.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self(width as f32 / height as f32))
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio() {
        let ratio = Resolution::new(640, 480).aspect_ratio().unwrap();
        assert_eq!(ratio.as_f32(), 4.0 / 3.0);
        assert_eq!(AspectRatio::new(300, 300), Some(AspectRatio::SQUARE));
        assert!(Resolution::new(0, 720).aspect_ratio().is_none());
    }

    #[test]
    fn empty() {
        assert!(Resolution::new(0, 0).is_empty());
        assert!(Resolution::new(640, 0).is_empty());
        assert!(!Resolution::new(640, 480).is_empty());
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }
}
