//! Threaded hand gesture detector.
//!
//! [`HandGestureDetector`] is the entry point for frame producers: [`submit`] never blocks on
//! inference. Admitted frames are processed by a [`Pipeline`] on a dedicated worker thread, and
//! frames arriving while one is in flight are dropped.
//!
//! [`submit`]: HandGestureDetector::submit

use std::sync::Arc;

use crate::{
    admission::{Admission, AdmissionGuard, AdmissionStats},
    config::TrackerConfig,
    detection::DetectionNetwork,
    error::Error,
    frame::Frame,
    hand::landmark::LandmarkNetwork,
    output::{HandObserver, ObserverSlot},
    pipeline::Pipeline,
    timer::FpsCounter,
    worker::{promise, Promise, Worker},
};

enum Message {
    Process {
        frame: Frame,
        admission: AdmissionGuard,
    },
    Flush(Promise<()>),
}

/// Tracks hands in a stream of frames on a background thread.
pub struct HandGestureDetector {
    admission: Admission,
    observer: Arc<ObserverSlot>,
    worker: Worker<Message>,
}

impl HandGestureDetector {
    /// Creates a detector and spawns its worker thread.
    ///
    /// Fails if `config` is invalid or the thread could not be spawned.
    pub fn new<D, L>(config: TrackerConfig, detector: D, landmarker: L) -> Result<Self, Error>
    where
        D: DetectionNetwork,
        L: LandmarkNetwork,
    {
        let observer = Arc::new(ObserverSlot::new());
        let mut pipeline = Pipeline::new(config, detector, landmarker, observer.clone())?;
        let mut fps = FpsCounter::new("hand tracking");

        let worker = Worker::builder()
            .name("hand tracker")
            .capacity(2)
            .spawn(move |message: Message| match message {
                Message::Process { frame, admission } => {
                    if let Err(e) = pipeline.process(&frame) {
                        log::warn!("frame at {:?} aborted: {}", frame.timestamp(), e);
                    }
                    fps.tick_with(pipeline.timers());

                    // Release before reopening admission.
                    frame.release();
                    drop(admission);
                }
                Message::Flush(promise) => promise.fulfill(()),
            })?;

        Ok(Self {
            admission: Admission::new(),
            observer,
            worker,
        })
    }

    /// Submits a frame for processing.
    ///
    /// Returns immediately. The frame is dropped (and its buffer released) if another frame is
    /// still being processed, or if it is malformed.
    pub fn submit(&self, frame: Frame) {
        if let Err(e) = frame.validate() {
            log::trace!("rejecting frame: {}", e);
            self.admission.reject();
            return;
        }

        let Some(admission) = self.admission.try_admit() else {
            log::trace!("busy, dropping frame at {:?}", frame.timestamp());
            return;
        };
        if self
            .worker
            .send(Message::Process { frame, admission })
            .is_err()
        {
            log::error!("hand tracker worker has exited, dropping frame");
        }
    }

    /// Sets the observer that receives the results of each processed frame.
    ///
    /// Only a weak reference is kept; dropping the last [`Arc`] unsubscribes the observer.
    pub fn set_observer<O: HandObserver + 'static>(&self, observer: &Arc<O>) {
        self.observer.set(observer);
    }

    pub fn clear_observer(&self) {
        self.observer.clear();
    }

    /// Blocks until all previously admitted frames have been processed.
    pub fn flush(&self) {
        let (promise, handle) = promise();
        if self.worker.send(Message::Flush(promise)).is_err() {
            log::error!("hand tracker worker has exited");
            return;
        }
        if handle.block().is_err() {
            log::error!("hand tracker worker exited during flush");
        }
    }

    /// Returns whether a frame is currently being processed.
    pub fn is_busy(&self) -> bool {
        self.admission.is_busy()
    }

    pub fn stats(&self) -> AdmissionStats {
        self.admission.stats()
    }
}

#[cfg(test)]
mod tests {
    use crate::test::{frame_at, Script, ScriptedDetector, ScriptedLandmarker};

    use super::*;

    fn detector(script: &Script) -> HandGestureDetector {
        HandGestureDetector::new(
            TrackerConfig::default(),
            ScriptedDetector::new(script),
            ScriptedLandmarker::new(script),
        )
        .unwrap()
    }

    #[test]
    fn flush_without_frames() {
        let script = Script::new();
        let detector = detector(&script);
        detector.flush();
        assert_eq!(detector.stats(), AdmissionStats::default());
    }

    #[test]
    fn sequential_frames_are_processed() {
        let script = Script::new();
        let detector = detector(&script);
        for i in 0..3 {
            detector.submit(frame_at(i));
            detector.flush();
        }
        assert_eq!(script.detect_calls(), 3);
        assert_eq!(detector.stats().admitted, 3);
        assert!(!detector.is_busy());
    }
}
