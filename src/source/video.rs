use std::path::Path;

use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgproc, videoio};

use super::{media_open, pacer_for, FrameSource, Pacer};
use crate::error::{PipelineError, Result};

/// What the decoder produced on the last read-ahead.
enum Lookahead {
    Frame(Mat),
    Failed(String),
    End,
}

/// Container video (mp4, avi, mov, mkv) decoded through OpenCV's `VideoCapture`.
///
/// Reads one frame ahead so `has_next` can answer without consuming anything.
pub struct VideoFileSource {
    capture: Option<videoio::VideoCapture>,
    lookahead: Lookahead,
    pacer: Option<Pacer>,
    rate: Option<f64>,
    index: u64,
}

impl VideoFileSource {
    /// Open `path` with whichever backend OpenCV picks.
    ///
    /// # Arguments
    /// * `path` - Video container file
    /// * `realtime` - Pace delivery to the container's `CAP_PROP_FPS`
    ///
    /// Returns: the opened source, or [`PipelineError::MediaOpen`] when the file
    /// cannot be decoded or pacing is requested without a usable frame rate.
    pub fn open(path: &Path, realtime: bool) -> Result<Self> {
        tracing::info!("Opening video file {}", path.display());

        let name = path
            .to_str()
            .ok_or_else(|| media_open(path, "path is not valid UTF-8"))?;
        let capture = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)
            .map_err(|e| media_open(path, e))?;
        if !capture.is_opened().map_err(|e| media_open(path, e))? {
            return Err(media_open(path, "no video backend could open the file"));
        }

        // Backends report 0 when the container carries no rate
        let fps = capture
            .get(videoio::CAP_PROP_FPS)
            .map_err(|e| media_open(path, e))?;
        let rate = (fps.is_finite() && fps > 0.0).then_some(fps);
        let pacer = pacer_for(path, rate, realtime)?;

        tracing::info!(
            "Video opened: declared rate {}, real-time {}",
            rate.map_or_else(|| "unknown".to_string(), |r| format!("{r:.2} fps")),
            pacer.is_some()
        );

        let mut source = Self {
            capture: Some(capture),
            lookahead: Lookahead::End,
            pacer,
            rate,
            index: 0,
        };
        source.read_ahead();
        Ok(source)
    }

    fn read_ahead(&mut self) {
        let Some(capture) = self.capture.as_mut() else {
            self.lookahead = Lookahead::End;
            return;
        };
        let mut mat = Mat::default();
        self.lookahead = match capture.read(&mut mat) {
            Ok(true) if !mat.empty() => Lookahead::Frame(mat),
            Ok(_) => Lookahead::End,
            Err(e) => Lookahead::Failed(e.to_string()),
        };
    }
}

fn mat_to_rgb(mat: &Mat) -> opencv::Result<Option<RgbImage>> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb.data_bytes()?.to_vec();
    Ok(RgbImage::from_raw(width, height, data))
}

impl FrameSource for VideoFileSource {
    fn has_next(&mut self) -> bool {
        !matches!(self.lookahead, Lookahead::End)
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        self.index += 1;
        let index = self.index;
        let decode_err = |reason: String| PipelineError::Decode { index, reason };

        let mat = match std::mem::replace(&mut self.lookahead, Lookahead::End) {
            Lookahead::Frame(mat) => mat,
            Lookahead::Failed(reason) => return Err(decode_err(reason)),
            Lookahead::End => return Err(decode_err("no frames remain".to_string())),
        };

        // Convert before the read-ahead reuses the capture buffer
        let image = mat_to_rgb(&mat)
            .map_err(|e| decode_err(e.to_string()))?
            .ok_or_else(|| decode_err("frame buffer does not match its dimensions".to_string()))?;
        self.read_ahead();

        // Frame rate limiting
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait();
        }
        Ok(image)
    }

    fn frame_rate(&self) -> Option<f64> {
        self.rate
    }

    fn close(&mut self) {
        self.lookahead = Lookahead::End;
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                tracing::warn!("Failed to release video capture: {}", e);
            }
            tracing::debug!("Video source closed after {} frames", self.index);
        }
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        self.close();
    }
}
