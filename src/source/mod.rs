mod gif;
mod pacing;
mod sequence;
#[cfg(feature = "video")]
mod video;

pub use gif::GifSource;
pub use pacing::Pacer;
pub use sequence::ImageSequenceSource;
#[cfg(feature = "video")]
pub use video::VideoFileSource;

use std::path::Path;

use image::RgbImage;

use crate::error::{PipelineError, Result};

/// A stored video read one decoded frame at a time.
pub trait FrameSource {
    /// True while undecoded frames remain.
    fn has_next(&mut self) -> bool;

    /// Decode the next frame, blocking first if the source is paced to its frame rate.
    fn next_frame(&mut self) -> Result<RgbImage>;

    /// Declared frames per second, if the media carries one.
    fn frame_rate(&self) -> Option<f64>;

    /// Release decoder resources. Safe to call at any point, and more than once.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        (**self).next_frame()
    }

    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    /// Deliver frames at the declared rate instead of as fast as they decode.
    pub realtime: bool,
    /// Declared rate for media that carries none of its own (image sequences).
    pub fps: f64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            realtime: true,
            fps: 30.0,
        }
    }
}

/// Container formats handed to the OpenCV decoder.
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Open whatever `path` names as a frame source.
///
/// # Arguments
/// * `path` - A directory of frame images, an animated `.gif`, or a video container
/// * `options` - Pacing mode, plus the declared rate for image sequences
///
/// Returns: the opened source, or [`PipelineError::MediaOpen`] for anything that
/// cannot be decoded.
pub fn open_source(path: &Path, options: SourceOptions) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(
            path,
            options.fps,
            options.realtime,
        )?));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("gif") => Ok(Box::new(GifSource::open(path, options.realtime)?)),
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => open_video_file(path, options),
        _ => Err(media_open(
            path,
            "unsupported media; expected a frame directory, an animated .gif or a video file",
        )),
    }
}

#[cfg(feature = "video")]
fn open_video_file(path: &Path, options: SourceOptions) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoFileSource::open(path, options.realtime)?))
}

#[cfg(not(feature = "video"))]
fn open_video_file(path: &Path, _options: SourceOptions) -> Result<Box<dyn FrameSource>> {
    Err(media_open(path, "video files need a build with the `video` feature"))
}

pub(crate) fn media_open(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::MediaOpen {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Pacing needs a usable declared rate; without pacing the rate is informational.
pub(crate) fn pacer_for(path: &Path, rate: Option<f64>, realtime: bool) -> Result<Option<Pacer>> {
    if !realtime {
        return Ok(None);
    }
    match rate.and_then(Pacer::from_rate) {
        Some(pacer) => Ok(Some(pacer)),
        None => Err(media_open(
            path,
            "real-time playback requested but the media declares no usable frame rate",
        )),
    }
}
