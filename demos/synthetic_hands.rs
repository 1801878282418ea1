//! Feeds a synthetic video of a hand moving in a circle into a [`HandGestureDetector`].
//!
//! The detection and landmark networks are replaced by stand-ins that know where the hand is.
//! Run with `RUST_LOG=hand_gesture=trace` to see every tracking decision.

use std::{
    f32::consts::TAU,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use hand_gesture::{
    detection::{Detection, DetectionNetwork, Keypoint},
    frame::{Frame, OwnedBuffer, PixelFormat},
    hand::landmark::{LandmarkNetwork, LandmarkResult},
    output::{HandObserver, Hooks},
    rect::{Rect, Region, Vec2},
    resolution::Resolution,
    HandGestureDetector, Smoothing, TrackerConfig,
};

const RES: Resolution = Resolution::new(640, 480);
const FPS: u32 = 30;
const FRAMES: u32 = 300;

/// Where the synthetic hand currently is, or `None` while it is out of view.
type Scene = Arc<Mutex<Option<Vec2>>>;

fn hand_position(frame: u32) -> Option<Vec2> {
    // The hand leaves the view for a second every 5 seconds.
    if frame % (5 * FPS) >= 4 * FPS {
        return None;
    }
    let t = frame as f32 / FPS as f32;
    let angle = t * TAU / 4.0;
    Some(Vec2::new(0.5 + 0.2 * angle.cos(), 0.5 + 0.2 * angle.sin()))
}

struct PalmNetwork(Scene);

impl DetectionNetwork for PalmNetwork {
    fn detect(&mut self, _: &Frame, detections: &mut Vec<Detection>) -> anyhow::Result<()> {
        let Some(pos) = *self.0.lock().unwrap() else {
            return Ok(());
        };
        let aspect = RES.aspect_ratio().map_or(1.0, |a| a.as_f32());
        let keypoints = vec![
            Keypoint::new(pos.x, pos.y + 0.05),
            Keypoint::new(pos.x - 0.02, pos.y - 0.04),
            Keypoint::new(pos.x, pos.y - 0.05),
        ];
        detections.push(Detection::with_keypoints(
            0.9,
            Rect::from_center(pos.x, pos.y, 0.1, 0.1 * aspect),
            keypoints,
        ));
        Ok(())
    }
}

struct HandNetwork(Scene);

impl LandmarkNetwork for HandNetwork {
    fn estimate(
        &mut self,
        frame: &Frame,
        roi: &Region,
        result: &mut LandmarkResult,
    ) -> anyhow::Result<()> {
        let res = frame.resolution();
        let scale = Vec2::new(res.width() as f32, res.height() as f32);
        let roi_px = roi.denormalize(res);

        let visible = *self.0.lock().unwrap();
        let center = visible.unwrap_or(roi.center());
        for (i, out) in result.landmarks_mut().positions_mut().iter_mut().enumerate() {
            // Wrist at the bottom, one column of joints per finger above it.
            let pos = if i == 0 {
                center + Vec2::new(0.0, 0.08)
            } else {
                let finger = (i - 1) / 4;
                let joint = (i - 1) % 4;
                center + Vec2::new(finger as f32 * 0.025 - 0.05, 0.02 - joint as f32 * 0.025)
            };
            let local = roi_px.transform_in(pos.component_mul(&scale));
            *out = [local.x / roi_px.width(), local.y / roi_px.height(), 0.0];
        }

        result.set_presence(if visible.is_some() { 0.95 } else { 0.05 });
        result.set_raw_handedness(0.8);
        Ok(())
    }
}

struct Printer;

impl HandObserver for Printer {
    fn on_rects(&self, rects: &[f32]) {
        for rect in rects.chunks_exact(5) {
            log::info!(
                "hand at ({:.3}, {:.3}), size {:.3}x{:.3}, rotated {:.1}°",
                rect[0],
                rect[1],
                rect[2],
                rect[3],
                rect[4].to_degrees()
            );
        }
    }

    fn hooks(&self) -> Hooks {
        Hooks {
            rects: true,
            ..Hooks::NONE
        }
    }
}

fn main() -> Result<(), hand_gesture::Error> {
    hand_gesture::init_logger!();

    let scene = Scene::default();
    let config = TrackerConfig::default().max_hands(1).smoothing(Smoothing::OneEuro {
        min_cutoff: 1.0,
        beta: 0.5,
    });
    let detector = HandGestureDetector::new(
        config,
        PalmNetwork(scene.clone()),
        HandNetwork(scene.clone()),
    )?;
    let printer = Arc::new(Printer);
    detector.set_observer(&printer);

    let frame_time = Duration::from_secs(1) / FPS;
    let start = Instant::now();
    for i in 0..FRAMES {
        *scene.lock().unwrap() = hand_position(i);
        detector.submit(Frame::new(
            OwnedBuffer::zeroed(RES, PixelFormat::Gray8),
            frame_time * i,
        ));

        let next = start + frame_time * (i + 1);
        thread::sleep(next.saturating_duration_since(Instant::now()));
    }
    detector.flush();

    let stats = detector.stats();
    log::info!(
        "{} frames admitted, {} dropped, {} rejected",
        stats.admitted,
        stats.dropped,
        stats.rejected
    );
    Ok(())
}
