//! Synchronous hand tracking pipeline.
//!
//! [`Pipeline`] runs validation, tracking and output dispatch for one frame on the calling thread.
//! [`HandGestureDetector`][crate::HandGestureDetector] drives it from a worker thread.

use std::sync::Arc;

use crate::{
    config::TrackerConfig,
    detection::DetectionNetwork,
    error::{Error, PipelineError},
    frame::Frame,
    hand::{landmark::LandmarkNetwork, tracking::HandTracker, tracking::HandTrackSet},
    output::{Dispatcher, ObserverSlot},
    timer::Timer,
};

/// Runs the detection, landmark, track update and dispatch stages for one frame at a time.
pub struct Pipeline {
    tracker: HandTracker,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Creates a pipeline that reports to the observer in `observer`.
    ///
    /// Fails if `config` is invalid.
    pub fn new<D, L>(
        config: TrackerConfig,
        detector: D,
        landmarker: L,
        observer: Arc<ObserverSlot>,
    ) -> Result<Self, Error>
    where
        D: DetectionNetwork,
        L: LandmarkNetwork,
    {
        config.validate()?;
        Ok(Self {
            tracker: HandTracker::new(config, detector, landmarker),
            dispatcher: Dispatcher::new(observer),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        self.tracker.config()
    }

    pub fn observer(&self) -> &Arc<ObserverSlot> {
        self.dispatcher.observer()
    }

    /// Returns the hands tracked after the last processed frame.
    pub fn tracks(&self) -> &HandTrackSet {
        self.tracker.tracks()
    }

    /// Processes `frame` and delivers the results to the observer.
    ///
    /// Malformed frames are rejected with [`PipelineError::InvalidFrame`] before anything runs.
    /// When inference fails, the tracked hands are left untouched and nothing is dispatched.
    pub fn process(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        frame.validate()?;
        self.tracker.track(frame)?;
        self.dispatcher.dispatch(frame, self.tracker.tracks());
        Ok(())
    }

    /// Returns profiling timers for all stages.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.tracker.timers().chain(self.dispatcher.timers())
    }
}
