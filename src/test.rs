//! Scripted networks and frames shared by the unit tests.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::{
    detection::{Detection, DetectionNetwork, Keypoint},
    frame::{Frame, OwnedBuffer, PixelFormat},
    hand::landmark::{LandmarkNetwork, LandmarkResult},
    landmark::Landmarks,
    rect::{Rect, Region, Vec2},
    resolution::Resolution,
};

pub const RES: Resolution = Resolution::new(640, 480);

/// Offsets of the 21 hand landmarks from the hand center, in normalized coordinates of [`RES`],
/// for an upright open hand.
const UPRIGHT_HAND: [[f32; 2]; 21] = [
    [0.0, 0.08],
    [-0.025, 0.06],
    [-0.04, 0.04],
    [-0.05, 0.02],
    [-0.05, 0.0],
    [-0.02, 0.0],
    [-0.022, -0.03],
    [-0.023, -0.05],
    [-0.024, -0.07],
    [0.0, -0.005],
    [0.0, -0.04],
    [0.0, -0.06],
    [0.0, -0.08],
    [0.02, 0.0],
    [0.022, -0.03],
    [0.024, -0.05],
    [0.025, -0.065],
    [0.04, 0.01],
    [0.045, -0.01],
    [0.048, -0.025],
    [0.05, -0.04],
];

/// Returns the landmarks of an upright hand centered at `(x, y)`.
pub fn upright_hand(x: f32, y: f32) -> Landmarks {
    let mut landmarks = Landmarks::new(UPRIGHT_HAND.len());
    for (pos, [dx, dy]) in landmarks.positions_mut().iter_mut().zip(UPRIGHT_HAND) {
        *pos = [x + dx, y + dy, 0.0];
    }
    landmarks
}

/// Returns a palm detection centered at `(x, y)`, with upright keypoints.
pub fn palm_detection(confidence: f32, x: f32, y: f32) -> Detection {
    let h = 0.1 * RES.aspect_ratio().map_or(1.0, |a| a.as_f32());
    let keypoints = [
        (0.0, 0.05),
        (-0.02, -0.04),
        (0.0, -0.05),
        (0.02, -0.04),
        (0.04, -0.03),
        (-0.03, 0.03),
        (-0.04, 0.0),
    ]
    .into_iter()
    .map(|(dx, dy)| Keypoint::new(x + dx, y + dy))
    .collect();
    Detection::with_keypoints(confidence, Rect::from_center(x, y, 0.1, h), keypoints)
}

/// A blank frame with the timestamp of the `index`th frame of a 30 FPS stream.
pub fn frame_at(index: u32) -> Frame {
    Frame::new(
        OwnedBuffer::zeroed(RES, PixelFormat::Gray8),
        Duration::from_millis(33 * u64::from(index)),
    )
}

#[derive(Default)]
struct State {
    /// `(confidence, x, y)` of each visible hand.
    hands: Vec<(f32, f32, f32)>,
    presence: f32,
    fail_detection: bool,
    fail_landmarks: bool,
    collapse_landmarks: bool,
    detect_calls: usize,
    landmark_calls: usize,
}

/// Scene description shared between a test and its scripted networks.
#[derive(Clone, Default)]
pub struct Script {
    state: Arc<Mutex<State>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Adds a hand that the detector reports with `confidence`, centered at `(x, y)`.
    pub fn push_hand(&self, confidence: f32, x: f32, y: f32) {
        self.lock().hands.push((confidence, x, y));
    }

    pub fn clear_hands(&self) {
        self.lock().hands.clear();
    }

    /// Sets the presence reported by the landmark network.
    pub fn set_presence(&self, presence: f32) {
        self.lock().presence = presence;
    }

    pub fn fail_detection(&self, fail: bool) {
        self.lock().fail_detection = fail;
    }

    pub fn fail_landmarks(&self, fail: bool) {
        self.lock().fail_landmarks = fail;
    }

    /// Makes the landmark network report every landmark at the hand's center.
    pub fn collapse_landmarks(&self, collapse: bool) {
        self.lock().collapse_landmarks = collapse;
    }

    pub fn detect_calls(&self) -> usize {
        self.lock().detect_calls
    }

    pub fn landmark_calls(&self) -> usize {
        self.lock().landmark_calls
    }
}

pub struct ScriptedDetector(Script);

impl ScriptedDetector {
    pub fn new(script: &Script) -> Self {
        Self(script.clone())
    }
}

impl DetectionNetwork for ScriptedDetector {
    fn detect(&mut self, _: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()> {
        let mut state = self.0.lock();
        state.detect_calls += 1;
        if state.fail_detection {
            anyhow::bail!("scripted detection failure");
        }
        detections.extend(
            state
                .hands
                .iter()
                .map(|&(conf, x, y)| palm_detection(conf, x, y)),
        );
        Ok(())
    }
}

/// Reports an upright hand at the scripted hand closest to the region, or at the region's center
/// if there are none.
pub struct ScriptedLandmarker(Script);

impl ScriptedLandmarker {
    pub fn new(script: &Script) -> Self {
        Self(script.clone())
    }
}

impl LandmarkNetwork for ScriptedLandmarker {
    fn estimate(
        &mut self,
        frame: &Frame,
        roi: &Region,
        result: &mut LandmarkResult,
    ) -> anyhow::Result<()> {
        let mut state = self.0.lock();
        state.landmark_calls += 1;
        if state.fail_landmarks {
            anyhow::bail!("scripted landmark failure");
        }

        let center = roi.center();
        let target = state
            .hands
            .iter()
            .map(|&(_, x, y)| Vec2::new(x, y))
            .min_by(|a, b| (a - center).norm().total_cmp(&(b - center).norm()))
            .unwrap_or(center);

        let res = frame.resolution();
        let scale = Vec2::new(res.width() as f32, res.height() as f32);
        let roi_px = roi.denormalize(res);
        let mut hand = upright_hand(target.x, target.y);
        if state.collapse_landmarks {
            hand.map_positions(|_| [target.x, target.y, 0.0]);
        }
        for (out, &[x, y, _]) in result
            .landmarks_mut()
            .positions_mut()
            .iter_mut()
            .zip(hand.positions())
        {
            let local = roi_px.transform_in(Vec2::new(x, y).component_mul(&scale));
            *out = [local.x / roi_px.width(), local.y / roi_px.height(), 0.0];
        }
        result.set_presence(state.presence);
        result.set_raw_handedness(0.9);
        Ok(())
    }
}
