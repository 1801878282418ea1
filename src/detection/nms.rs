//! Non-Maximum Suppression and Averaging.
//!
//! Detection networks typically report every hand several times, with slightly shifted boxes.
//! Non-Maximum Suppression (NMS) merges these duplicates so that each hand is represented by a
//! single detection, which is what the tracker's slot assignment expects.
//!
//! Two variants are implemented, selected with [`SuppressionMode`]: classic suppression that keeps
//! only the most confident of a group of overlapping detections ([`SuppressionMode::Remove`]), and
//! Non-Maximum Averaging ([`SuppressionMode::Average`]) that replaces the group with its
//! confidence-weighted average. Averaging reduces jitter between frames and is the default.

use crate::{
    iter::zip_exact,
    num::TotalF32,
    rect::{Rect, Vec2},
};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    group: Vec<Detection>,
    out_buf: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a suppressor using [`SuppressionMode::Average`] and
    /// [`NonMaxSuppression::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            group: Vec::new(),
            out_buf: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` is drained in the process. The merged detections are returned as an iterator,
    /// most confident group first.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Ascending confidence, so that popping yields the most confident remaining detection.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            let iou_thresh = self.iou_thresh;
            let overlaps = |other: &Detection| seed_rect.iou(&other.bounding_rect()) >= iou_thresh;

            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| !overlaps(other));
                    self.out_buf.push(seed);
                }
                SuppressionMode::Average => {
                    self.group.clear();
                    let mut i = 0;
                    while i < detections.len() {
                        if overlaps(&detections[i]) {
                            self.group.push(detections.remove(i));
                        } else {
                            i += 1;
                        }
                    }

                    let merged = if self.group.is_empty() {
                        seed
                    } else {
                        self.group.push(seed);
                        weighted_average(&self.group)
                    };
                    self.out_buf.push(merged);
                }
            }
        }

        self.group.clear();
        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of a group of overlapping detections.
///
/// The result carries the confidence of the group's seed, which is its last entry. Keypoints are
/// only averaged if all detections have the same number of them.
fn weighted_average(group: &[Detection]) -> Detection {
    let seed = &group[group.len() - 1];
    let keypoint_count = seed.keypoints().len();
    let average_keypoints = group
        .iter()
        .all(|det| det.keypoints().len() == keypoint_count);

    let mut center = Vec2::zeros();
    let mut size = Vec2::zeros();
    let mut angle = 0.0;
    let mut keypoints = vec![Vec2::zeros(); keypoint_count];
    let mut divisor = 0.0;
    for det in group {
        let weight = det.confidence();
        divisor += weight;

        let rect = det.bounding_rect();
        center += rect.center() * weight;
        size += rect.size() * weight;
        angle += det.angle() * weight;
        if average_keypoints {
            for (acc, kp) in zip_exact(&mut keypoints, det.keypoints()) {
                *acc += Vec2::new(kp.x(), kp.y()) * weight;
            }
        }
    }

    if divisor <= 0.0 {
        // All weights are zero, there is nothing to average by.
        return seed.clone();
    }

    let mut merged = Detection::new(
        seed.confidence(),
        Rect::from_center(
            center.x / divisor,
            center.y / divisor,
            size.x / divisor,
            size.y / divisor,
        ),
    );
    merged.set_angle(angle / divisor);
    if average_keypoints {
        *merged.keypoints_mut() = keypoints
            .iter()
            .map(|kp| Keypoint::new(kp.x / divisor, kp.y / divisor))
            .collect();
    } else {
        *merged.keypoints_mut() = seed.keypoints().to_vec();
    }
    merged
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn remove_keeps_most_confident() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let a = Detection::new(0.55, rect.scale(1.5));
        let b = Detection::new(0.6, rect);
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.6);
        assert_eq!(detections[0].bounding_rect(), rect);
    }

    #[test]
    fn keeps_separate_objects() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(1.0, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.8, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 1.0);
    }

    #[test]
    fn average_weights_by_confidence() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let a = Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]);
        let b = Detection::with_keypoints(0.5, rect.scale(4.0), vec![Keypoint::new(3.0, 0.0)]);
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_abs_diff_eq!(rect.center().x, -1.0);
        assert_abs_diff_eq!(rect.center().y, 3.0);
        assert_abs_diff_eq!(rect.width(), 2.0);
        assert_abs_diff_eq!(rect.height(), 2.0);
        assert_abs_diff_eq!(d.keypoints()[0].x(), 1.0);
    }
}
