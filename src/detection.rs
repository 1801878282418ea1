//! Common functionality for object detection.
//!
//! The model runtime is not part of this crate: a [`DetectionNetwork`] is anything that can turn
//! a [`Frame`] into a list of raw, possibly duplicated, [`Detection`]s. The [`Detector`] wrapper
//! adds thresholding, non-maximum suppression and profiling on top.

pub mod nms;

use crate::{
    frame::Frame,
    num::TotalF32,
    rect::{Rect, RotatedRect},
    timer::Timer,
};

use self::nms::NonMaxSuppression;

/// Trait implemented by networks that detect objects in a whole frame.
///
/// This is the seam where a trained model runtime plugs into the pipeline.
pub trait DetectionNetwork: Send + 'static {
    /// Runs detection on `frame`, appending the raw detections to `detections`.
    ///
    /// Rectangles and keypoints are expected in normalized frame coordinates (`0.0..=1.0` on both
    /// axes). Overlapping duplicates are fine, they are merged by the [`Detector`]. Finding nothing
    /// is not an error.
    fn detect(&mut self, frame: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()>;
}

impl<N: DetectionNetwork + ?Sized> DetectionNetwork for Box<N> {
    fn detect(&mut self, frame: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()> {
        (**self).detect(frame, detections)
    }
}

/// A generic object detector wrapping a [`DetectionNetwork`].
pub struct Detector {
    network: Box<dyn DetectionNetwork>,
    raw: Vec<Detection>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: DetectionNetwork>(network: N) -> Self {
        Self {
            network: Box::new(network),
            raw: Vec::new(),
            detections: Vec::new(),
            t_infer: Timer::new("detection"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    /// Sets the minimum confidence of the detections returned by [`Detector::detect`].
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Returns the suppressor that merges overlapping detections.
    pub fn nms_mut(&mut self) -> &mut NonMaxSuppression {
        &mut self.nms
    }

    /// Runs detection on `frame`.
    ///
    /// Returns the deduplicated detections with confidence at or above the threshold, sorted by
    /// descending confidence.
    pub fn detect(&mut self, frame: &Frame) -> anyhow::Result<&[Detection]> {
        self.raw.clear();
        self.detections.clear();

        self.t_infer
            .time(|| self.network.detect(frame, &mut self.raw))?;
        log::trace!("{} raw detections", self.raw.len());

        let thresh = self.thresh;
        self.raw.retain(|det| det.confidence() >= thresh);

        self.t_nms.time(|| {
            self.detections.extend(self.nms.process(&mut self.raw));
        });
        self.detections
            .sort_by_key(|det| std::cmp::Reverse(TotalF32(det.confidence())));

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, an
/// optional rotation angle of the object, and a possibly empty set of located keypoints.
///
/// Per convention, the confidence value lies between 0.0 and 1.0. It is used as the weight when
/// performing non-maximum suppression with [`nms::SuppressionMode::Average`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints: Vec::new(),
        }
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    ///
    /// Not all networks compute an object angle. If it is not supported, the angle is 0.0.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Sets the angle of the detected object, in radians, clockwise.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Returns the bounding rectangle, rotated by the object angle.
    pub fn region(&self) -> RotatedRect {
        RotatedRect::new(self.rect, self.angle)
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the specific detector and on its index in the keypoint
/// list. Typically keypoints are used to rotate a detected object for further processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
