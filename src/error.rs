use std::path::PathBuf;

use thiserror::Error;

use crate::rate::RateState;

/// Errors raised anywhere along the segmentation pipeline.
///
/// None of these are retried: the controller treats every variant as fatal for
/// the current run, releases its resources and reports what it managed to
/// process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("failed to open media {}: {reason}", .path.display())]
    MediaOpen { path: PathBuf, reason: String },

    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },

    #[error("output sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("failed to send frame to output: {0}")]
    Send(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("frame is {frame:?} but mask is {mask:?}")]
    DimensionMismatch { frame: (u32, u32), mask: (u32, u32) },

    #[error("class index {index} outside label set of {len} entries")]
    UnknownClass { index: u32, len: usize },

    #[error("blend alpha {0} outside [0, 1]")]
    InvalidAlpha(f32),

    #[error("rate monitor cannot {op} while {state}")]
    InvalidState { op: &'static str, state: RateState },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
