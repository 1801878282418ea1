//! Hand landmark prediction.

use nalgebra::{Rotation2, Vector2};

use crate::{
    frame::Frame,
    landmark::Landmarks,
    rect::{Region, RotatedRect, Vec2},
    resolution::{AspectRatio, Resolution},
    timer::Timer,
};

/// Trait implemented by networks that regress hand landmarks inside a region of interest.
///
/// This is the seam where a trained model runtime plugs into the pipeline.
pub trait LandmarkNetwork: Send + 'static {
    /// Estimates the landmarks of the hand inside `roi`, writing them to `result`.
    ///
    /// `roi` is in normalized frame coordinates. The landmark positions written to `result` are
    /// relative to the region: `(0, 0)` is the top left corner of the (unrotated) region and
    /// `(1, 1)` its bottom right corner. `z` is expressed in units of the region's width.
    ///
    /// The presence value should be between 0.0 and 1.0, and indicates how confident the network
    /// is that a hand is visible in `roi`.
    fn estimate(
        &mut self,
        frame: &Frame,
        roi: &Region,
        result: &mut LandmarkResult,
    ) -> anyhow::Result<()>;
}

impl<N: LandmarkNetwork + ?Sized> LandmarkNetwork for Box<N> {
    fn estimate(
        &mut self,
        frame: &Frame,
        roi: &Region,
        result: &mut LandmarkResult,
    ) -> anyhow::Result<()> {
        (**self).estimate(frame, roi, result)
    }
}

/// Runs a [`LandmarkNetwork`] and maps its output back to frame coordinates.
pub struct Landmarker {
    network: Box<dyn LandmarkNetwork>,
    t_infer: Timer,
    t_map: Timer,
    result_buffer: LandmarkResult,
}

impl Landmarker {
    pub fn new<N: LandmarkNetwork>(network: N, num_landmarks: usize) -> Self {
        Self {
            network: Box::new(network),
            t_infer: Timer::new("landmark"),
            t_map: Timer::new("map"),
            result_buffer: LandmarkResult::new(num_landmarks),
        }
    }

    /// Computes hand landmarks in the `roi` of `frame`.
    ///
    /// The landmarks of the returned [`LandmarkResult`] are in normalized frame coordinates.
    pub fn estimate(&mut self, frame: &Frame, roi: &Region) -> anyhow::Result<&LandmarkResult> {
        self.result_buffer.reset();
        self.t_infer
            .time(|| self.network.estimate(frame, roi, &mut self.result_buffer))?;

        let res = frame.resolution();
        let roi_px = roi.denormalize(res);
        let (w, h) = (res.width() as f32, res.height() as f32);
        let landmarks = self.result_buffer.landmarks_mut();
        self.t_map.time(|| {
            landmarks.map_positions(|[x, y, z]| {
                let local = Vec2::new(x * roi_px.width(), y * roi_px.height());
                let p = roi_px.transform_out(local);
                [p.x / w, p.y / h, z * roi_px.width() / w]
            });
        });

        Ok(&self.result_buffer)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_map].into_iter()
    }
}

/// Landmark results returned by [`Landmarker::estimate`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl LandmarkResult {
    /// Creates an empty result with room for `num_landmarks` landmarks.
    pub fn new(num_landmarks: usize) -> Self {
        Self {
            landmarks: Landmarks::new(num_landmarks),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }

    fn reset(&mut self) {
        self.landmarks.map_positions(|_| [0.0; 3]);
        self.presence = 0.0;
        self.raw_handedness = 0.0;
    }

    /// Overwrites `self` with the contents of `other`, reusing the allocation.
    pub fn copy_from(&mut self, other: &LandmarkResult) {
        self.landmarks.copy_from(&other.landmarks);
        self.presence = other.presence;
        self.raw_handedness = other.raw_handedness;
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    pub fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    /// Returns the presence flag, indicating the confidence of whether a hand was in the input
    /// region.
    ///
    /// The value is between 0.0 and 1.0, with higher values indicating higher confidence that a
    /// hand was present.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    pub fn set_presence(&mut self, presence: f32) {
        self.presence = presence;
    }

    /// Sets the raw handedness score, where values above 0.5 indicate a right hand.
    pub fn set_raw_handedness(&mut self, raw_handedness: f32) {
        self.raw_handedness = raw_handedness;
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This assumes that the camera image is passed in as-is (not mirrored), and should only be
    /// relied on when the presence is over the landmark threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Computes the clockwise rotation of the hand compared to an upright position.
///
/// `landmarks` are in normalized coordinates of a frame with resolution `res`; the angle is
/// measured in pixel space. A rotation of 0° means that fingers are pointed upwards. Returns
/// [`None`] if the wrist or the middle finger MCP landmark is missing.
pub fn rotation_radians(landmarks: &Landmarks, res: Resolution) -> Option<f32> {
    let scale = Vec2::new(res.width() as f32, res.height() as f32);
    let point = |idx: LandmarkIdx| {
        landmarks
            .positions()
            .get(idx as usize)
            .map(|&[x, y, _]| Vec2::new(x, y).component_mul(&scale))
    };
    let finger = point(LandmarkIdx::MiddleFingerMcp)?;
    let wrist = point(LandmarkIdx::Wrist)?;

    let rel = wrist - finger;
    Some(Rotation2::rotation_between(&Vector2::y(), &rel).angle())
}

/// Derives the region of interest for the next frame from a hand's landmarks.
///
/// The region is the bounding rectangle of the landmarks, rotated with the hand and padded by
/// `padding` on every side, then extended to a square in pixel space.
///
/// Returns [`None`] if there are no landmarks, if any of them is not finite, or if their bounds
/// have no area (for example when all landmarks coincide).
pub fn tracking_roi(landmarks: &Landmarks, res: Resolution, padding: f32) -> Option<Region> {
    if !landmarks.iter().all(|p| p.iter().all(|c| c.is_finite())) {
        return None;
    }

    let angle = rotation_radians(landmarks, res)
        .filter(|a| a.is_finite())
        .unwrap_or(0.0);
    let scale = Vec2::new(res.width() as f32, res.height() as f32);
    let bounds = RotatedRect::bounding(
        angle,
        landmarks
            .iter()
            .map(|[x, y, _]| Vec2::new(x, y).component_mul(&scale)),
    )?;
    let area = bounds.rect().area();
    if !(area.is_finite() && area > 0.0) || !bounds.center().iter().all(|c| c.is_finite()) {
        return None;
    }

    Some(
        bounds
            .grow_rel(padding)
            .grow_to_fit_aspect(AspectRatio::SQUARE)
            .normalize(res),
    )
}
