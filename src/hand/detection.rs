//! Palm detection.

use nalgebra::{Rotation2, Vector2};

use crate::{
    detection::{nms::SuppressionMode, Detection, DetectionNetwork, Detector},
    frame::Frame,
    rect::{Region, RotatedRect, Vec2},
    resolution::{AspectRatio, Resolution},
    timer::Timer,
};

/// Indices of the palm keypoints reported by the usual 7-keypoint palm detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// A detected hand: the region the landmark network should look at, and the detection
/// confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandRegion {
    confidence: f32,
    region: Region,
}

impl HandRegion {
    pub fn new(confidence: f32, region: Region) -> Self {
        Self { confidence, region }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the hand's region in normalized frame coordinates.
    pub fn region(&self) -> Region {
        self.region
    }
}

/// Detects palms and turns them into whole-hand regions of interest.
pub struct PalmDetector {
    detector: Detector,
    palm_padding: f32,
    regions: Vec<HandRegion>,
    t_roi: Timer,
}

impl PalmDetector {
    /// Relative padding that grows a palm box into a box enclosing the fingers.
    pub const DEFAULT_PALM_PADDING: f32 = 0.8;

    pub fn new<N: DetectionNetwork>(network: N) -> Self {
        Self {
            detector: Detector::new(network),
            palm_padding: Self::DEFAULT_PALM_PADDING,
            regions: Vec::new(),
            t_roi: Timer::new("roi"),
        }
    }

    /// Sets the minimum detection confidence.
    pub fn set_threshold(&mut self, thresh: f32) {
        self.detector.set_threshold(thresh);
    }

    /// Configures how overlapping palm detections are merged.
    pub fn set_suppression(&mut self, mode: SuppressionMode, iou_thresh: f32) {
        let nms = self.detector.nms_mut();
        nms.set_mode(mode);
        nms.set_iou_thresh(iou_thresh);
    }

    /// Sets the relative amount of padding added to each side of the palm box.
    ///
    /// # Panics
    ///
    /// Panics when `padding` is negative or NaN.
    pub fn set_palm_padding(&mut self, padding: f32) {
        assert!(padding >= 0.0);
        self.palm_padding = padding;
    }

    /// Detects hands in `frame`.
    ///
    /// Returns the hand regions in descending confidence order.
    pub fn detect(&mut self, frame: &Frame) -> anyhow::Result<&[HandRegion]> {
        self.regions.clear();
        let res = frame.resolution();
        let detections = self.detector.detect(frame)?;

        let palm_padding = self.palm_padding;
        let regions = &mut self.regions;
        self.t_roi.time(|| {
            regions.extend(
                detections
                    .iter()
                    .map(|det| HandRegion::new(det.confidence(), hand_roi(det, res, palm_padding))),
            );
        });

        Ok(&self.regions)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector.timers().chain([&self.t_roi])
    }
}

/// Computes the clockwise palm rotation from its keypoints, in pixel space.
///
/// A rotation of 0° means that the fingers point upwards. Returns [`None`] if the detection does
/// not carry the wrist and middle finger keypoints.
pub fn palm_rotation(det: &Detection, res: Resolution) -> Option<f32> {
    let scale = Vec2::new(res.width() as f32, res.height() as f32);
    let point = |kp: Keypoint| {
        det.keypoints()
            .get(kp as usize)
            .map(|kp| Vec2::new(kp.x(), kp.y()).component_mul(&scale))
    };
    let wrist = point(Keypoint::Wrist)?;
    let finger = point(Keypoint::MiddleFingerMcp)?;

    let rel = wrist - finger;
    Some(Rotation2::rotation_between(&Vector2::y(), &rel).angle())
}

/// Grows a palm detection into a square, rotated region enclosing the whole hand.
fn hand_roi(det: &Detection, res: Resolution, palm_padding: f32) -> Region {
    let angle = palm_rotation(det, res).unwrap_or(det.angle());
    RotatedRect::new(det.bounding_rect(), angle)
        .denormalize(res)
        .grow_rel(palm_padding)
        .grow_to_fit_aspect(AspectRatio::SQUARE)
        .normalize(res)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use crate::{detection, rect::Rect};

    use super::*;

    fn palm(wrist: (f32, f32), middle: (f32, f32)) -> Detection {
        let mut keypoints = vec![detection::Keypoint::new(0.0, 0.0); 7];
        keypoints[Keypoint::Wrist as usize] = detection::Keypoint::new(wrist.0, wrist.1);
        keypoints[Keypoint::MiddleFingerMcp as usize] = detection::Keypoint::new(middle.0, middle.1);
        Detection::with_keypoints(0.9, Rect::from_center(0.5, 0.5, 0.1, 0.2), keypoints)
    }

    #[test]
    fn upright_palm() {
        let res = Resolution::new(200, 100);
        let det = palm((0.5, 0.6), (0.5, 0.4));
        assert_abs_diff_eq!(palm_rotation(&det, res).unwrap(), 0.0);
    }

    #[test]
    fn sideways_palm() {
        let res = Resolution::new(200, 100);
        // Fingers pointing to the right.
        let det = palm((0.4, 0.5), (0.6, 0.5));
        assert_abs_diff_eq!(palm_rotation(&det, res).unwrap().abs(), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn no_keypoints_uses_detection_angle() {
        let res = Resolution::new(100, 100);
        let mut det = Detection::new(0.9, Rect::from_center(0.5, 0.5, 0.1, 0.1));
        det.set_angle(0.25);
        assert!(palm_rotation(&det, res).is_none());
        assert_abs_diff_eq!(hand_roi(&det, res, 0.0).rotation_radians(), 0.25);
    }

    /// Reports two overlapping palms, the more confident one at `x = 0.5`.
    struct TwoPalms;

    impl DetectionNetwork for TwoPalms {
        fn detect(&mut self, _: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()> {
            detections.push(Detection::new(0.9, Rect::from_center(0.5, 0.5, 0.2, 0.2)));
            detections.push(Detection::new(0.6, Rect::from_center(0.54, 0.5, 0.2, 0.2)));
            Ok(())
        }
    }

    #[test]
    fn suppression_mode() {
        let frame = Frame::new(
            crate::frame::OwnedBuffer::zeroed(
                Resolution::new(100, 100),
                crate::frame::PixelFormat::Gray8,
            ),
            Default::default(),
        );

        let mut detector = PalmDetector::new(TwoPalms);
        detector.set_suppression(SuppressionMode::Remove, 0.3);
        let regions = detector.detect(&frame).unwrap();
        assert_eq!(regions.len(), 1);
        assert_abs_diff_eq!(regions[0].region().center().x, 0.5, epsilon = 1e-5);

        detector.set_suppression(SuppressionMode::Average, 0.3);
        let regions = detector.detect(&frame).unwrap();
        assert_eq!(regions.len(), 1);
        assert!(regions[0].region().center().x > 0.505);

        // Nothing overlaps enough to be merged.
        detector.set_suppression(SuppressionMode::Remove, 0.95);
        assert_eq!(detector.detect(&frame).unwrap().len(), 2);
    }

    #[test]
    fn hand_roi_is_square_in_pixels() {
        let res = Resolution::new(200, 100);
        let det = palm((0.5, 0.6), (0.5, 0.4));
        let roi = hand_roi(&det, res, 0.5).denormalize(res);
        // Palm box is 20x20 pixels, padded by 50% on each side.
        assert_abs_diff_eq!(roi.width(), 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(roi.height(), 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(roi.center(), Vec2::new(100.0, 50.0), epsilon = 1e-4);
    }
}
