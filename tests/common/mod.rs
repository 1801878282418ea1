//! Stub networks and frames for the integration tests.

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crossbeam::channel::{Receiver, Sender};
use hand_gesture::{
    detection::{Detection, DetectionNetwork, Keypoint},
    frame::{Frame, PixelBuffer, PixelFormat},
    hand::landmark::{LandmarkNetwork, LandmarkResult},
    landmark::Landmarks,
    output::{HandObserver, Hooks},
    rect::{Rect, Region, Vec2},
    resolution::Resolution,
};

pub const RES: Resolution = Resolution::new(320, 240);
pub const NUM_LANDMARKS: usize = 21;

/// Landmarks of an upright hand with its wrist at `(x, y + 0.08)`.
///
/// Each finger is a vertical line of 4 joints, spread out horizontally.
pub fn hand_at(x: f32, y: f32) -> Landmarks {
    let mut landmarks = Landmarks::new(NUM_LANDMARKS);
    let positions = landmarks.positions_mut();
    positions[0] = [x, y + 0.08, 0.0];
    for finger in 0..5 {
        for joint in 0..4 {
            positions[1 + finger * 4 + joint] = [
                x - 0.05 + finger as f32 * 0.025,
                y + 0.02 - joint as f32 * 0.025,
                -0.01 * joint as f32,
            ];
        }
    }
    landmarks
}

pub fn frame(index: u32) -> Frame {
    Frame::new(
        CountedBuffer::new(RES, Arc::default()),
        Duration::from_millis(33 * u64::from(index)),
    )
}

/// A gray frame whose buffer counts how often it is released.
pub fn counted_frame(index: u32) -> (Frame, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    let frame = Frame::new(
        CountedBuffer::new(RES, releases.clone()),
        Duration::from_millis(33 * u64::from(index)),
    );
    (frame, releases)
}

pub struct CountedBuffer {
    resolution: Resolution,
    data: Vec<u8>,
    releases: Arc<AtomicUsize>,
}

impl CountedBuffer {
    pub fn new(resolution: Resolution, releases: Arc<AtomicUsize>) -> Self {
        Self {
            resolution,
            data: vec![0; resolution.width() as usize * resolution.height() as usize],
            releases,
        }
    }
}

impl PixelBuffer for CountedBuffer {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Gray8
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct SceneState {
    /// `(detection confidence, x, y)`
    hands: Vec<(f32, f32, f32)>,
    presence: f32,
    detect_calls: usize,
}

/// The hands visible to the stub networks.
#[derive(Clone, Default)]
pub struct Scene {
    state: Arc<Mutex<SceneState>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hands(&self, hands: &[(f32, f32, f32)]) {
        self.state.lock().unwrap().hands = hands.to_vec();
    }

    pub fn set_presence(&self, presence: f32) {
        self.state.lock().unwrap().presence = presence;
    }

    pub fn detect_calls(&self) -> usize {
        self.state.lock().unwrap().detect_calls
    }
}

pub struct StubDetector {
    scene: Scene,
    gate: Option<Gate>,
}

impl StubDetector {
    pub fn new(scene: &Scene) -> Self {
        Self {
            scene: scene.clone(),
            gate: None,
        }
    }

    /// Makes every detection call wait until the test opens the returned [`GateControl`].
    pub fn gated(scene: &Scene) -> (Self, GateControl) {
        let (gate, control) = gate();
        let detector = Self {
            scene: scene.clone(),
            gate: Some(gate),
        };
        (detector, control)
    }
}

impl DetectionNetwork for StubDetector {
    fn detect(&mut self, _: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()> {
        if let Some(gate) = &self.gate {
            gate.pass()?;
        }

        let mut state = self.scene.state.lock().unwrap();
        state.detect_calls += 1;
        let h = 0.1 * RES.aspect_ratio().unwrap().as_f32();
        for &(confidence, x, y) in &state.hands {
            let keypoints = vec![
                Keypoint::new(x, y + 0.04),
                Keypoint::new(x - 0.02, y - 0.03),
                Keypoint::new(x, y - 0.04),
                Keypoint::new(x + 0.02, y - 0.03),
                Keypoint::new(x + 0.04, y - 0.02),
                Keypoint::new(x - 0.03, y + 0.02),
                Keypoint::new(x - 0.04, y),
            ];
            detections.push(Detection::with_keypoints(
                confidence,
                Rect::from_center(x, y, 0.1, h),
                keypoints,
            ));
        }
        Ok(())
    }
}

/// Reports the scene hand closest to the region it is given.
pub struct StubLandmarker {
    scene: Scene,
}

impl StubLandmarker {
    pub fn new(scene: &Scene) -> Self {
        Self {
            scene: scene.clone(),
        }
    }
}

impl LandmarkNetwork for StubLandmarker {
    fn estimate(
        &mut self,
        frame: &Frame,
        roi: &Region,
        result: &mut LandmarkResult,
    ) -> anyhow::Result<()> {
        let state = self.scene.state.lock().unwrap();
        let center = roi.center();
        let target = state
            .hands
            .iter()
            .map(|&(_, x, y)| Vec2::new(x, y))
            .min_by(|a, b| (a - center).norm().total_cmp(&(b - center).norm()))
            .unwrap_or(center);

        let res = frame.resolution();
        let (w, h) = (res.width() as f32, res.height() as f32);
        let roi_px = roi.denormalize(res);
        let hand = hand_at(target.x, target.y);
        for (out, [x, y, z]) in result
            .landmarks_mut()
            .positions_mut()
            .iter_mut()
            .zip(hand.iter())
        {
            let local = roi_px.transform_in(Vec2::new(x * w, y * h));
            *out = [
                local.x / roi_px.width(),
                local.y / roi_px.height(),
                z * w / roi_px.width(),
            ];
        }
        result.set_presence(state.presence);
        result.set_raw_handedness(0.2);
        Ok(())
    }
}

pub struct Gate {
    entered: Sender<()>,
    open: Receiver<()>,
}

impl Gate {
    fn pass(&self) -> anyhow::Result<()> {
        self.entered.send(())?;
        self.open.recv()?;
        Ok(())
    }
}

pub struct GateControl {
    entered: Receiver<()>,
    open: Sender<()>,
}

impl GateControl {
    /// Blocks until a network call reaches the gate.
    pub fn wait_entered(&self) {
        self.entered.recv().unwrap();
    }

    /// Lets one waiting network call through.
    pub fn open(&self) {
        self.open.send(()).unwrap();
    }
}

fn gate() -> (Gate, GateControl) {
    let (entered_tx, entered_rx) = crossbeam::channel::unbounded();
    let (open_tx, open_rx) = crossbeam::channel::unbounded();
    (
        Gate {
            entered: entered_tx,
            open: open_rx,
        },
        GateControl {
            entered: entered_rx,
            open: open_tx,
        },
    )
}

/// One observed output packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub timestamp: Option<Duration>,
    pub landmarks: Vec<f32>,
    pub rects: Vec<f32>,
}

/// Records every packet delivered to it.
#[derive(Default)]
pub struct Recorder {
    packets: Mutex<Vec<Packet>>,
}

impl Recorder {
    pub fn packets(&self) -> Vec<Packet> {
        self.packets.lock().unwrap().clone()
    }
}

impl HandObserver for Recorder {
    fn on_frame(&self, frame: &Frame) {
        self.packets.lock().unwrap().push(Packet {
            timestamp: Some(frame.timestamp()),
            ..Packet::default()
        });
    }

    fn on_landmarks(&self, landmarks: &[f32]) {
        let mut packets = self.packets.lock().unwrap();
        let packet = packets.last_mut().expect("landmarks delivered before frame");
        packet.landmarks = landmarks.to_vec();
    }

    fn on_rects(&self, rects: &[f32]) {
        let mut packets = self.packets.lock().unwrap();
        let packet = packets.last_mut().expect("rects delivered before frame");
        packet.rects = rects.to_vec();
    }

    fn hooks(&self) -> Hooks {
        Hooks::ALL
    }
}
