//! Error types.

use std::fmt;

use thiserror::Error;

use crate::frame::PixelFormat;
use crate::resolution::Resolution;

/// Crate-level error returned when setting up a pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn pipeline worker: {0}")]
    Io(#[from] std::io::Error),
}

/// An input frame that cannot be processed.
///
/// Frames failing validation are rejected at admission and never reach the tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has zero size ({0})")]
    ZeroSize(Resolution),

    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(PixelFormat),

    #[error("frame buffer too small for {resolution} {format}: expected {expected} bytes, got {actual}")]
    BufferTooSmall {
        resolution: Resolution,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Invalid [`TrackerConfig`][crate::config::TrackerConfig] values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// The inference stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detection,
    Landmark,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Detection => "detection",
            Stage::Landmark => "landmark",
        })
    }
}

/// Error aborting the processing of a single frame.
///
/// None of these are fatal: the track set is left as it was before the frame, nothing is
/// dispatched, and the next frame is processed normally.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("{stage} inference failed: {source}")]
    Inference {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub(crate) fn inference(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Inference { stage, source }
    }
}
