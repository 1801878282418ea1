//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
///
/// Used to sort detections and candidates by confidence.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_nan_last() {
        let mut v = [TotalF32(0.5), TotalF32(f32::NAN), TotalF32(-1.0), TotalF32(0.9)];
        v.sort();
        assert_eq!(v[0].0, -1.0);
        assert_eq!(v[2].0, 0.9);
        assert!(v[3].0.is_nan());
    }
}
