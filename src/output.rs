//! Output assembly and observer dispatch.
//!
//! After each processed frame, the landmarks and regions of all tracked hands are flattened into
//! two arrays, index-aligned by slot order, and handed to the registered [`HandObserver`].

use std::sync::{Arc, Mutex, Weak};

use crate::{frame::Frame, hand::tracking::HandTrackSet, timer::Timer};

/// Number of floats per region in the rect array: center x, center y, width, height, rotation.
pub const RECT_STRIDE: usize = 5;

/// Number of floats per landmark in the landmark array.
pub const LANDMARK_STRIDE: usize = 3;

/// Receives the results of every processed frame.
///
/// All methods have no-op defaults. An observer declares the hooks it is interested in via
/// [`HandObserver::hooks`]; hooks that aren't subscribed are never called.
///
/// The hooks are called from the pipeline's worker thread, in the order `on_frame`,
/// `on_landmarks`, `on_rects`, all with data from the same frame. The slices are only valid for
/// the duration of the call.
pub trait HandObserver: Send + Sync {
    /// Called with the processed frame.
    fn on_frame(&self, frame: &Frame) {
        let _ = frame;
    }

    /// Called with the flattened `x, y, z` landmarks of all hands.
    ///
    /// The array holds `hands × landmarks_per_hand × 3` values, and is empty when no hand is
    /// tracked.
    fn on_landmarks(&self, landmarks: &[f32]) {
        let _ = landmarks;
    }

    /// Called with the flattened `center x, center y, width, height, rotation` regions of all
    /// hands (`hands × 5` values).
    fn on_rects(&self, rects: &[f32]) {
        let _ = rects;
    }

    /// Returns the set of hooks this observer subscribes to.
    fn hooks(&self) -> Hooks {
        Hooks::default()
    }
}

/// Selects which [`HandObserver`] hooks are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hooks {
    pub frame: bool,
    pub landmarks: bool,
    pub rects: bool,
}

impl Hooks {
    pub const ALL: Self = Self {
        frame: true,
        landmarks: true,
        rects: true,
    };

    pub const NONE: Self = Self {
        frame: false,
        landmarks: false,
        rects: false,
    };

    fn any(&self) -> bool {
        self.frame || self.landmarks || self.rects
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::ALL
    }
}

/// A swappable, weak reference to the current [`HandObserver`].
///
/// The pipeline never keeps an observer alive: once the last strong reference is dropped, results
/// stop being assembled.
#[derive(Default)]
pub struct ObserverSlot {
    inner: Mutex<Option<Weak<dyn HandObserver>>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current observer.
    pub fn set<O: HandObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn HandObserver> = observer.clone();
        *self.lock() = Some(Arc::downgrade(&observer));
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Returns the current observer, if one is set and still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn HandObserver>> {
        self.lock().as_ref()?.upgrade()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Weak<dyn HandObserver>>> {
        // The slot only holds a pointer, so a panic while locked can't leave it inconsistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The results of one frame.
#[derive(Debug, Clone, Copy)]
pub struct OutputPacket<'a> {
    frame: &'a Frame,
    landmarks: &'a [f32],
    rects: &'a [f32],
    hand_count: usize,
}

impl<'a> OutputPacket<'a> {
    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    pub fn landmarks(&self) -> &'a [f32] {
        self.landmarks
    }

    pub fn rects(&self) -> &'a [f32] {
        self.rects
    }

    pub fn hand_count(&self) -> usize {
        self.hand_count
    }
}

/// Reusable buffers holding the flattened results of the last frame.
#[derive(Debug, Default)]
struct OutputBuffers {
    landmarks: Vec<f32>,
    rects: Vec<f32>,
}

impl OutputBuffers {
    fn assemble<'a>(&'a mut self, frame: &'a Frame, tracks: &HandTrackSet) -> OutputPacket<'a> {
        self.landmarks.clear();
        self.rects.clear();
        let mut hand_count = 0;
        for track in tracks.iter() {
            self.landmarks.extend(track.landmarks().iter().flatten());
            self.rects.extend(track.roi().to_array());
            hand_count += 1;
        }
        OutputPacket {
            frame,
            landmarks: &self.landmarks,
            rects: &self.rects,
            hand_count,
        }
    }
}

/// Assembles [`OutputPacket`]s and delivers them to the observer in an [`ObserverSlot`].
pub struct Dispatcher {
    observer: Arc<ObserverSlot>,
    buffers: OutputBuffers,
    t_dispatch: Timer,
}

impl Dispatcher {
    pub fn new(observer: Arc<ObserverSlot>) -> Self {
        Self {
            observer,
            buffers: OutputBuffers::default(),
            t_dispatch: Timer::new("dispatch"),
        }
    }

    pub fn observer(&self) -> &Arc<ObserverSlot> {
        &self.observer
    }

    /// Flattens the tracked hands into an [`OutputPacket`] for `frame`, in slot order.
    pub fn assemble<'a>(&'a mut self, frame: &'a Frame, tracks: &HandTrackSet) -> OutputPacket<'a> {
        self.buffers.assemble(frame, tracks)
    }

    /// Delivers the results for `frame` to the current observer.
    ///
    /// Does nothing if no observer is set, or if it subscribes to no hooks.
    pub fn dispatch(&mut self, frame: &Frame, tracks: &HandTrackSet) {
        let Some(observer) = self.observer.upgrade() else {
            log::trace!("no observer, skipping output assembly");
            return;
        };
        let hooks = observer.hooks();
        if !hooks.any() {
            return;
        }

        self.t_dispatch.time(|| {
            let packet = self.buffers.assemble(frame, tracks);
            log::trace!("dispatching {} hands", packet.hand_count());
            deliver(&*observer, hooks, &packet);
        });
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dispatch].into_iter()
    }
}

fn deliver(observer: &dyn HandObserver, hooks: Hooks, packet: &OutputPacket<'_>) {
    if hooks.frame {
        observer.on_frame(packet.frame);
    }
    if hooks.landmarks {
        observer.on_landmarks(packet.landmarks);
    }
    if hooks.rects {
        observer.on_rects(packet.rects);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::TrackerConfig,
        hand::tracking::HandTracker,
        test::{frame_at, Script, ScriptedDetector, ScriptedLandmarker},
    };

    use super::*;

    #[derive(Default)]
    struct Recorder {
        hooks: Option<Hooks>,
        calls: Mutex<Vec<(&'static str, usize)>>,
    }

    impl HandObserver for Recorder {
        fn on_frame(&self, _: &Frame) {
            self.calls.lock().unwrap().push(("frame", 0));
        }

        fn on_landmarks(&self, landmarks: &[f32]) {
            self.calls.lock().unwrap().push(("landmarks", landmarks.len()));
        }

        fn on_rects(&self, rects: &[f32]) {
            self.calls.lock().unwrap().push(("rects", rects.len()));
        }

        fn hooks(&self) -> Hooks {
            self.hooks.unwrap_or_default()
        }
    }

    fn tracker(script: &Script) -> HandTracker {
        HandTracker::new(
            TrackerConfig::default(),
            ScriptedDetector::new(script),
            ScriptedLandmarker::new(script),
        )
    }

    #[test]
    fn empty_arrays_are_delivered() {
        let script = Script::new();
        let mut tracker = tracker(&script);
        let frame = frame_at(0);
        tracker.track(&frame).unwrap();

        let slot = Arc::new(ObserverSlot::new());
        let recorder = Arc::new(Recorder::default());
        slot.set(&recorder);
        Dispatcher::new(slot).dispatch(&frame, tracker.tracks());

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(*calls, [("frame", 0), ("landmarks", 0), ("rects", 0)]);
    }

    #[test]
    fn arrays_are_slot_aligned() {
        let script = Script::new();
        script.push_hand(0.9, 0.25, 0.5);
        script.push_hand(0.8, 0.75, 0.5);
        script.set_presence(0.9);
        let mut tracker = tracker(&script);
        let frame = frame_at(0);
        tracker.track(&frame).unwrap();

        let mut dispatcher = Dispatcher::new(Arc::new(ObserverSlot::new()));
        let packet = dispatcher.assemble(&frame, tracker.tracks());
        assert_eq!(packet.hand_count(), 2);
        assert_eq!(packet.landmarks().len(), 2 * 21 * LANDMARK_STRIDE);
        assert_eq!(packet.rects().len(), 2 * RECT_STRIDE);

        for (i, track) in tracker.tracks().iter().enumerate() {
            let rect = &packet.rects()[i * RECT_STRIDE..][..RECT_STRIDE];
            assert_eq!(rect, track.roi().to_array());
            let first = &packet.landmarks()[i * 21 * LANDMARK_STRIDE..][..LANDMARK_STRIDE];
            assert_eq!(first, track.landmarks().get(0));
        }
    }

    #[test]
    fn unsubscribed_hooks_are_skipped() {
        let frame = frame_at(0);
        let script = Script::new();
        let tracker = tracker(&script);

        let slot = Arc::new(ObserverSlot::new());
        let recorder = Arc::new(Recorder {
            hooks: Some(Hooks {
                landmarks: false,
                ..Hooks::ALL
            }),
            ..Recorder::default()
        });
        slot.set(&recorder);
        Dispatcher::new(slot).dispatch(&frame, tracker.tracks());

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(*calls, [("frame", 0), ("rects", 0)]);
    }

    #[test]
    fn observer_is_held_weakly() {
        let slot = ObserverSlot::new();
        let recorder = Arc::new(Recorder::default());
        slot.set(&recorder);
        assert!(slot.upgrade().is_some());
        drop(recorder);
        assert!(slot.upgrade().is_none());

        let recorder = Arc::new(Recorder::default());
        slot.set(&recorder);
        slot.clear();
        assert!(slot.upgrade().is_none());
    }
}
