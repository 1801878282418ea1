//! Tracker configuration.

use crate::{
    detection::nms::{NonMaxSuppression, SuppressionMode},
    error::ConfigError,
};

/// Temporal smoothing applied to the landmarks of tracked hands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// Landmarks are exposed as estimated.
    None,

    /// Exponential moving average; `factor` in `0.0..=1.0` is the weight of the newest value.
    Ema { factor: f32 },

    /// Unweighted average over the last `window` estimates.
    MovingAverage { window: usize },

    /// [1€ filter](https://gery.casiez.net/1euro/) driven by the frame timestamps.
    OneEuro { min_cutoff: f32, beta: f32 },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::Ema { factor: 0.5 }
    }
}

/// Options controlling detection, tracking and smoothing.
///
/// Values are set with the builder methods and checked by [`TrackerConfig::validate`] when a
/// tracker is created:
///
/// ```
/// # use hand_gesture::config::{Smoothing, TrackerConfig};
/// let config = TrackerConfig::default()
///     .max_hands(1)
///     .miss_tolerance(2)
///     .smoothing(Smoothing::MovingAverage { window: 3 });
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    max_hands: usize,
    landmarks_per_hand: usize,
    detection_threshold: f32,
    landmark_threshold: f32,
    miss_tolerance: u32,
    smoothing: Smoothing,
    suppression: SuppressionMode,
    nms_iou_threshold: f32,
    iou_threshold: f32,
    roi_padding: f32,
    palm_padding: f32,
    confidence_factor: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_hands: Self::DEFAULT_MAX_HANDS,
            landmarks_per_hand: Self::DEFAULT_LANDMARKS_PER_HAND,
            detection_threshold: Self::DEFAULT_DETECTION_THRESHOLD,
            landmark_threshold: Self::DEFAULT_LANDMARK_THRESHOLD,
            miss_tolerance: Self::DEFAULT_MISS_TOLERANCE,
            smoothing: Smoothing::default(),
            suppression: SuppressionMode::Average,
            nms_iou_threshold: Self::DEFAULT_NMS_IOU_THRESHOLD,
            iou_threshold: Self::DEFAULT_IOU_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
            palm_padding: Self::DEFAULT_PALM_PADDING,
            confidence_factor: Self::DEFAULT_CONFIDENCE_FACTOR,
        }
    }
}

impl TrackerConfig {
    pub const DEFAULT_MAX_HANDS: usize = 2;

    /// Size of the usual 21-point hand topology.
    pub const DEFAULT_LANDMARKS_PER_HAND: usize = 21;

    pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_LANDMARK_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_MISS_TOLERANCE: u32 = 2;

    pub const DEFAULT_NMS_IOU_THRESHOLD: f32 = NonMaxSuppression::DEFAULT_IOU_THRESH;

    pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    pub const DEFAULT_PALM_PADDING: f32 = 0.8;

    pub const DEFAULT_CONFIDENCE_FACTOR: f32 = 0.5;

    /// Sets the maximum number of concurrently tracked hands.
    pub fn max_hands(self, max_hands: usize) -> Self {
        Self { max_hands, ..self }
    }

    /// Sets the number of landmarks the landmark network produces per hand.
    pub fn landmarks_per_hand(self, landmarks_per_hand: usize) -> Self {
        Self {
            landmarks_per_hand,
            ..self
        }
    }

    /// Sets the minimum confidence a detection needs to seed a new track.
    pub fn detection_threshold(self, detection_threshold: f32) -> Self {
        Self {
            detection_threshold,
            ..self
        }
    }

    /// Sets the minimum landmark confidence that counts as the hand being visible.
    pub fn landmark_threshold(self, landmark_threshold: f32) -> Self {
        Self {
            landmark_threshold,
            ..self
        }
    }

    /// Sets the number of consecutive low-confidence frames after which a track is lost.
    pub fn miss_tolerance(self, miss_tolerance: u32) -> Self {
        Self {
            miss_tolerance,
            ..self
        }
    }

    pub fn smoothing(self, smoothing: Smoothing) -> Self {
        Self { smoothing, ..self }
    }

    /// Sets how overlapping palm detections of the same frame are merged.
    pub fn suppression(self, suppression: SuppressionMode) -> Self {
        Self {
            suppression,
            ..self
        }
    }

    /// Sets the IoU at which two palm detections of the same frame are merged.
    pub fn nms_iou_threshold(self, nms_iou_threshold: f32) -> Self {
        Self {
            nms_iou_threshold,
            ..self
        }
    }

    /// Sets the IoU above which a detection is considered to be a hand that is already tracked.
    pub fn iou_threshold(self, iou_threshold: f32) -> Self {
        Self {
            iou_threshold,
            ..self
        }
    }

    /// Sets the relative padding added to each side of the landmark bounds when deriving the
    /// next tracking region.
    pub fn roi_padding(self, roi_padding: f32) -> Self {
        Self {
            roi_padding,
            ..self
        }
    }

    /// Sets the relative padding that grows a palm detection into a whole-hand region.
    pub fn palm_padding(self, palm_padding: f32) -> Self {
        Self {
            palm_padding,
            ..self
        }
    }

    /// Sets the EMA factor of the rolling per-track confidence.
    pub fn confidence_factor(self, confidence_factor: f32) -> Self {
        Self {
            confidence_factor,
            ..self
        }
    }

    pub fn get_max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn get_landmarks_per_hand(&self) -> usize {
        self.landmarks_per_hand
    }

    pub fn get_detection_threshold(&self) -> f32 {
        self.detection_threshold
    }

    pub fn get_landmark_threshold(&self) -> f32 {
        self.landmark_threshold
    }

    pub fn get_miss_tolerance(&self) -> u32 {
        self.miss_tolerance
    }

    pub fn get_smoothing(&self) -> Smoothing {
        self.smoothing
    }

    pub fn get_suppression(&self) -> SuppressionMode {
        self.suppression
    }

    pub fn get_nms_iou_threshold(&self) -> f32 {
        self.nms_iou_threshold
    }

    pub fn get_iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn get_roi_padding(&self) -> f32 {
        self.roi_padding
    }

    pub fn get_palm_padding(&self) -> f32 {
        self.palm_padding
    }

    pub fn get_confidence_factor(&self) -> f32 {
        self.confidence_factor
    }

    /// Checks that all values are in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hands == 0 {
            return Err(ConfigError::invalid("max_hands", "must be at least 1"));
        }
        if self.landmarks_per_hand == 0 {
            return Err(ConfigError::invalid(
                "landmarks_per_hand",
                "must be at least 1",
            ));
        }
        unit_interval("detection_threshold", self.detection_threshold)?;
        unit_interval("landmark_threshold", self.landmark_threshold)?;
        unit_interval("nms_iou_threshold", self.nms_iou_threshold)?;
        unit_interval("iou_threshold", self.iou_threshold)?;
        unit_interval("confidence_factor", self.confidence_factor)?;
        non_negative("roi_padding", self.roi_padding)?;
        non_negative("palm_padding", self.palm_padding)?;

        match self.smoothing {
            Smoothing::None => {}
            Smoothing::Ema { factor } => unit_interval("smoothing.factor", factor)?,
            Smoothing::MovingAverage { window } => {
                if window == 0 {
                    return Err(ConfigError::invalid(
                        "smoothing.window",
                        "must be at least 1",
                    ));
                }
            }
            Smoothing::OneEuro { min_cutoff, beta } => {
                if !(min_cutoff > 0.0) {
                    return Err(ConfigError::invalid(
                        "smoothing.min_cutoff",
                        format!("must be positive, got {min_cutoff}"),
                    ));
                }
                non_negative("smoothing.beta", beta)?;
            }
        }

        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be between 0.0 and 1.0, got {value}"),
        ))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    // Also rejects NaN.
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be 0.0 or greater, got {value}"),
        ))
    }
}
