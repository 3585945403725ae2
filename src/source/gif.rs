use std::fs::File;
use std::io::BufReader;
use std::iter::Peekable;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Delay, DynamicImage, Frames, RgbImage};

use super::{media_open, pacer_for, FrameSource, Pacer};
use crate::error::{PipelineError, Result};

/// Animated GIF played back frame by frame.
///
/// The declared rate comes from the first frame's delay.
pub struct GifSource {
    frames: Option<Peekable<Frames<'static>>>,
    pacer: Option<Pacer>,
    rate: Option<f64>,
    index: u64,
}

impl GifSource {
    pub fn open(path: &Path, realtime: bool) -> Result<Self> {
        tracing::info!("Opening animated GIF {}", path.display());

        let file = File::open(path).map_err(|e| media_open(path, e))?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| media_open(path, e))?;
        let mut frames = decoder.into_frames().peekable();

        // Peek so the first frame is still delivered
        let rate = match frames.peek() {
            Some(Ok(first)) => rate_from_delay(first.delay()),
            Some(Err(e)) => return Err(media_open(path, e)),
            None => None,
        };
        let pacer = pacer_for(path, rate, realtime)?;

        tracing::info!(
            "GIF opened: declared rate {}, real-time {}",
            rate.map_or_else(|| "unknown".to_string(), |r| format!("{r:.2} fps")),
            pacer.is_some()
        );

        Ok(Self {
            frames: Some(frames),
            pacer,
            rate,
            index: 0,
        })
    }
}

fn rate_from_delay(delay: Delay) -> Option<f64> {
    let (numer, denom) = delay.numer_denom_ms();
    if numer == 0 {
        return None;
    }
    Some(1000.0 * denom as f64 / numer as f64)
}

impl FrameSource for GifSource {
    fn has_next(&mut self) -> bool {
        self.frames
            .as_mut()
            .is_some_and(|frames| frames.peek().is_some())
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        self.index += 1;
        let index = self.index;
        let decode_err = |reason: String| PipelineError::Decode { index, reason };

        let frames = self
            .frames
            .as_mut()
            .ok_or_else(|| decode_err("source is closed".to_string()))?;
        let frame = match frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(decode_err(e.to_string())),
            None => return Err(decode_err("no frames remain".to_string())),
        };
        // Drop alpha
        let image = DynamicImage::ImageRgba8(frame.into_buffer()).into_rgb8();

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
        if self.frames.take().is_some() {
            tracing::debug!("GIF source closed after {} frames", self.index);
        }
    }
}
