//! Real-time semantic segmentation overlay for stored video.
//!
//! Frames are read from a [`source::FrameSource`] (optionally paced to the
//! media's declared rate), classified by a [`segmentation::SegmentationModel`],
//! blended with a color-coded class mask and pushed to an
//! [`output::OutputSink`]. [`pipeline::PipelineController`] owns the loop and
//! guarantees the source and sink are released on every exit path.

pub mod error;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod rate;
pub mod segmentation;
pub mod source;

pub use error::{PipelineError, Result};
