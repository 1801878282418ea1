//! Hand tracking.
//!
//! The [`HandTracker`] keeps a fixed number of track slots. Each frame, every tracked hand is
//! re-estimated in the region derived from its previous landmarks, and palm detection is only run
//! while there are free slots. All inference of a frame happens before any track is modified, so
//! a failing network leaves the tracks exactly as they were.

use std::time::Duration;

use itertools::Itertools;

use crate::{
    config::TrackerConfig,
    detection::DetectionNetwork,
    error::{PipelineError, Stage},
    frame::Frame,
    landmark::{LandmarkFilter, Landmarks},
    rect::{Rect, Region},
    resolution::Resolution,
    timer::Timer,
};

use super::{
    detection::{HandRegion, PalmDetector},
    landmark::{self, Handedness, LandmarkNetwork, LandmarkResult, Landmarker},
};

/// Time between frames assumed when timestamps don't advance.
const FALLBACK_FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Lifecycle state of a [`HandTrack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Created from a detection, waiting for its first landmark estimate.
    Detecting,
    /// Landmarks are estimated in the region derived from the previous frame.
    Tracking,
    /// The hand was not visible for too many consecutive frames. Lost tracks are removed in the
    /// same update.
    Lost,
}

/// ID of a tracked hand.
///
/// The assigned [`HandId`]s are unique per [`HandTracker`] assigning them. They stay the same for
/// as long as the hand is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandId(u64);

impl HandId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A hand occupying one slot of a [`HandTrackSet`].
pub struct HandTrack {
    slot: usize,
    id: HandId,
    state: TrackState,
    smoothed: Landmarks,
    filter: LandmarkFilter,
    roi: Region,
    confidence: f32,
    age: u32,
    misses: u32,
    handedness: Handedness,
    last_timestamp: Duration,
}

impl HandTrack {
    fn new(
        slot: usize,
        id: HandId,
        region: Region,
        timestamp: Duration,
        config: &TrackerConfig,
    ) -> Self {
        let n = config.get_landmarks_per_hand();
        Self {
            slot,
            id,
            state: TrackState::Detecting,
            smoothed: Landmarks::new(n),
            filter: LandmarkFilter::from_smoothing(&config.get_smoothing(), n),
            roi: region,
            confidence: 0.0,
            age: 0,
            misses: 0,
            handedness: Handedness::Left,
            last_timestamp: timestamp,
        }
    }

    /// Returns the index of the slot the track occupies.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn id(&self) -> HandId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Returns the smoothed landmarks, in normalized frame coordinates.
    pub fn landmarks(&self) -> &Landmarks {
        &self.smoothed
    }

    /// Returns the region of interest the hand will be searched in on the next frame.
    pub fn roi(&self) -> Region {
        self.roi
    }

    /// Returns the rolling (exponentially averaged) landmark confidence.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the number of frames the track has been updated in.
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Returns the number of consecutive frames without a confident landmark estimate.
    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    fn observe_confidence(&mut self, presence: f32, factor: f32) {
        self.confidence = if self.age == 0 {
            presence
        } else {
            factor * presence + (1.0 - factor) * self.confidence
        };
    }

    /// Applies a confident landmark estimate.
    ///
    /// Returns `false` and leaves the track untouched if no tracking region can be derived from
    /// the estimated landmarks.
    fn hit(
        &mut self,
        result: &LandmarkResult,
        timestamp: Duration,
        res: Resolution,
        config: &TrackerConfig,
    ) -> bool {
        let padding = config.get_roi_padding();
        let Some(raw_roi) = landmark::tracking_roi(result.landmarks(), res, padding) else {
            return false;
        };

        let elapsed = timestamp
            .checked_sub(self.last_timestamp)
            .filter(|d| !d.is_zero())
            .unwrap_or(FALLBACK_FRAME_TIME);

        self.smoothed.copy_from(result.landmarks());
        self.filter
            .filter(&mut self.smoothed, elapsed.as_secs_f32());
        self.roi = landmark::tracking_roi(&self.smoothed, res, padding).unwrap_or(raw_roi);

        self.observe_confidence(result.presence(), config.get_confidence_factor());
        self.handedness = result.handedness();
        self.misses = 0;
        self.age += 1;
        self.last_timestamp = timestamp;
        true
    }

    /// Records a frame in which the hand was not confidently visible.
    fn miss(&mut self, result: &LandmarkResult, config: &TrackerConfig) {
        self.observe_confidence(result.presence(), config.get_confidence_factor());
        self.misses += 1;
        self.age += 1;
        if self.misses >= config.get_miss_tolerance() {
            self.state = TrackState::Lost;
        }
    }
}

/// Fixed-capacity arena of [`HandTrack`]s.
///
/// Tracks keep their slot for their whole life, and are always visited in slot order, which makes
/// the order of hands in the output packets deterministic.
pub struct HandTrackSet {
    slots: Box<[Option<HandTrack>]>,
    next_id: u64,
}

impl HandTrackSet {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next_id: 0,
        }
    }

    /// Returns the maximum number of tracks.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn free_count(&self) -> usize {
        self.capacity() - self.active_count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Returns the track in `slot`, if any.
    pub fn get(&self, slot: usize) -> Option<&HandTrack> {
        self.slots.get(slot)?.as_ref()
    }

    /// Returns an iterator over all tracks, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &HandTrack> + '_ {
        self.slots.iter().flatten()
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut HandTrack> {
        self.slots.get_mut(slot)?.as_mut()
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    fn next_id(&mut self) -> HandId {
        let id = HandId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, track: HandTrack) {
        let slot = track.slot;
        assert!(self.slots[slot].is_none(), "slot {slot} is occupied");
        self.slots[slot] = Some(track);
    }

    fn retire(&mut self, slot: usize) -> Option<HandTrack> {
        self.slots.get_mut(slot)?.take()
    }
}

/// Detects and tracks up to [`TrackerConfig::max_hands`] hands.
pub struct HandTracker {
    config: TrackerConfig,
    detector: PalmDetector,
    landmarker: Landmarker,
    tracks: HandTrackSet,
    /// Per-slot landmark estimates of the current frame.
    track_results: Box<[LandmarkResult]>,
    candidates: Vec<HandRegion>,
    candidate_results: Box<[LandmarkResult]>,
    t_update: Timer,
}

impl HandTracker {
    /// Creates a tracker from a palm detection and a hand landmark network.
    ///
    /// `config` is expected to be valid (see [`TrackerConfig::validate`]).
    pub fn new<D, L>(config: TrackerConfig, detector: D, landmarker: L) -> Self
    where
        D: DetectionNetwork,
        L: LandmarkNetwork,
    {
        let max_hands = config.get_max_hands();
        let n = config.get_landmarks_per_hand();
        let results = || {
            (0..max_hands)
                .map(|_| LandmarkResult::new(n))
                .collect::<Box<[_]>>()
        };

        let mut detector = PalmDetector::new(detector);
        detector.set_threshold(config.get_detection_threshold());
        detector.set_palm_padding(config.get_palm_padding());
        detector.set_suppression(config.get_suppression(), config.get_nms_iou_threshold());

        Self {
            detector,
            landmarker: Landmarker::new(landmarker, n),
            tracks: HandTrackSet::new(max_hands),
            track_results: results(),
            candidates: Vec::with_capacity(max_hands),
            candidate_results: results(),
            t_update: Timer::new("update"),
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns the current set of tracked hands.
    pub fn tracks(&self) -> &HandTrackSet {
        &self.tracks
    }

    /// Processes a frame, updating the tracked hands.
    ///
    /// If any inference fails, the error is returned and the tracks are left untouched.
    pub fn track(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.estimate(frame)?;
        self.t_update.time(|| {
            Self::update(
                &mut self.tracks,
                &self.track_results,
                &self.candidates,
                &self.candidate_results,
                frame,
                &self.config,
            )
        });
        Ok(())
    }

    /// Runs all inference for `frame`, without touching the tracks.
    fn estimate(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        let res = frame.resolution();

        for track in self.tracks.iter() {
            let result = self
                .landmarker
                .estimate(frame, &track.roi)
                .map_err(PipelineError::inference(Stage::Landmark))?;
            self.track_results[track.slot].copy_from(result);
        }

        self.candidates.clear();
        let free = self.tracks.free_count();
        if free == 0 {
            log::trace!(
                "all {} slots occupied, skipping detection",
                self.tracks.capacity()
            );
            return Ok(());
        }

        let regions = self
            .detector
            .detect(frame)
            .map_err(PipelineError::inference(Stage::Detection))?;
        let iou_thresh = self.config.get_iou_threshold();
        for hand in regions {
            if self.candidates.len() == free {
                break;
            }

            // Palm detection also finds the hands that are already tracked. Compare in pixels, so
            // that the overlap isn't skewed by the frame's aspect ratio.
            let bounds = hand.region().denormalize(res).bounding_rect();
            let overlaps = |region: Region| {
                is_same_hand(&region.denormalize(res).bounding_rect(), &bounds, iou_thresh)
            };
            if self.tracks.iter().any(|track| overlaps(track.roi))
                || self.candidates.iter().any(|cand| overlaps(cand.region()))
            {
                log::trace!(
                    "ignoring detection with confidence {:.2}: overlaps a tracked hand",
                    hand.confidence()
                );
                continue;
            }

            self.candidates.push(*hand);
        }

        if !self.candidates.is_empty() {
            log::trace!(
                "new hand candidates: {}",
                self.candidates
                    .iter()
                    .map(|cand| format!("{:.2}", cand.confidence()))
                    .join(", ")
            );
        }

        for (cand, out) in self.candidates.iter().zip(self.candidate_results.iter_mut()) {
            let result = self
                .landmarker
                .estimate(frame, &cand.region())
                .map_err(PipelineError::inference(Stage::Landmark))?;
            out.copy_from(result);
        }

        Ok(())
    }

    /// Applies the estimates of the current frame to the track set, in slot order.
    fn update(
        tracks: &mut HandTrackSet,
        track_results: &[LandmarkResult],
        candidates: &[HandRegion],
        candidate_results: &[LandmarkResult],
        frame: &Frame,
        config: &TrackerConfig,
    ) {
        let res = frame.resolution();
        let timestamp = frame.timestamp();
        let threshold = config.get_landmark_threshold();

        for slot in 0..tracks.capacity() {
            let Some(track) = tracks.get_mut(slot) else {
                continue;
            };
            let result = &track_results[slot];
            if result.presence() >= threshold {
                if track.hit(result, timestamp, res, config) {
                    continue;
                }
                log::trace!("hand {:?}: landmarks have no usable bounds", track.id);
            }

            track.miss(result, config);
            log::trace!(
                "hand {:?}: miss with presence {:.2} ({} consecutive)",
                track.id,
                result.presence(),
                track.misses
            );
            if track.state == TrackState::Lost {
                log::debug!("hand {:?} lost after {} frames", track.id, track.age);
                tracks.retire(slot);
            }
        }

        for (cand, result) in candidates.iter().zip(candidate_results) {
            if result.presence() < threshold {
                log::trace!(
                    "discarding candidate: presence {:.2} below threshold",
                    result.presence()
                );
                continue;
            }
            let Some(slot) = tracks.free_slot() else {
                break;
            };

            let id = tracks.next_id();
            let mut track = HandTrack::new(slot, id, cand.region(), timestamp, config);
            if !track.hit(result, timestamp, res, config) {
                log::trace!("discarding candidate: landmarks have no usable bounds");
                continue;
            }
            track.state = TrackState::Tracking;
            log::debug!(
                "tracking new hand {:?} in slot {} (detection {:.2}, presence {:.2})",
                id,
                slot,
                cand.confidence(),
                result.presence()
            );
            tracks.insert(track);
        }
    }

    /// Returns profiling timers for all stages of the tracker.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector
            .timers()
            .chain(self.landmarker.timers())
            .chain([&self.t_update])
    }
}

/// Returns whether a detection covering `detected` is the hand tracked in `tracked`.
///
/// Besides overlapping by at least `iou_thresh`, this is the case when the center of `detected`
/// lies inside `tracked`.
fn is_same_hand(tracked: &Rect, detected: &Rect, iou_thresh: f32) -> bool {
    tracked.iou(detected) >= iou_thresh || tracked.contains_point(detected.center())
}
