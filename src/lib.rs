//! Real-time hand tracking.
//!
//! Frames from a camera (or any other producer) are handed to a [`HandGestureDetector`], which
//! tracks up to [`TrackerConfig::get_max_hands`] hands and reports their landmarks and regions
//! to a [`HandObserver`](output::HandObserver).
//!
//! The crate does not run neural networks itself. Palm detection and hand landmark estimation
//! are plugged in through the [`DetectionNetwork`](detection::DetectionNetwork) and
//! [`LandmarkNetwork`](hand::landmark::LandmarkNetwork) traits.
//!
//! # Coordinates
//!
//! All coordinates exposed by this crate are normalized to the frame: `(0.0, 0.0)` is the top left
//! corner, `(1.0, 1.0)` the bottom right corner, and Y points *down*. Rotations are in radians,
//! clockwise, with 0 meaning that the fingers point up.
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the log levels set by [`init_logger!`].

use log::LevelFilter;

pub mod admission;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod hand;
pub mod iter;
pub mod landmark;
pub mod num;
pub mod output;
pub mod pipeline;
pub mod rect;
pub mod resolution;
pub mod timer;
pub mod worker;

mod drop;

#[cfg(test)]
mod test;

pub use config::{Smoothing, TrackerConfig};
pub use detector::HandGestureDetector;
pub use error::Error;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, unless overridden with `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
