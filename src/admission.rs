//! Drop-newest frame admission.
//!
//! At most one frame is processed at a time. A frame arriving while another one is in flight is
//! dropped on the spot instead of being queued, which keeps latency bounded by a single frame.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct Shared {
    in_flight: AtomicBool,
    admitted: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

/// Gate that admits one frame at a time.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    shared: Arc<Shared>,
}

impl Admission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to admit a frame.
    ///
    /// Returns [`None`] and counts the frame as dropped if another frame is still in flight.
    /// Otherwise, returns a guard that keeps the admission closed until it is dropped.
    pub fn try_admit(&self) -> Option<AdmissionGuard> {
        match self.shared.in_flight.compare_exchange(
            false,
            true,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                self.shared.admitted.fetch_add(1, Ordering::Relaxed);
                Some(AdmissionGuard {
                    shared: self.shared.clone(),
                })
            }
            Err(_) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Records a frame that was refused because it is malformed.
    pub fn reject(&self) {
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns whether a frame is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            admitted: self.shared.admitted.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Keeps the [`Admission`] closed while alive.
#[derive(Debug)]
pub struct AdmissionGuard {
    shared: Arc<Shared>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

/// Frame counters of an [`Admission`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    /// Frames accepted for processing.
    pub admitted: u64,
    /// Frames dropped because another frame was in flight.
    pub dropped: u64,
    /// Malformed frames.
    pub rejected: u64,
}
