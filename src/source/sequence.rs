use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

use super::{media_open, pacer_for, FrameSource, Pacer};
use crate::error::{PipelineError, Result};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A directory of still frames, played in file-name order.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    position: usize,
    pacer: Option<Pacer>,
    rate: f64,
}

impl ImageSequenceSource {
    /// # Arguments
    /// * `dir` - Directory holding png/jpg/bmp frames
    /// * `fps` - Declared rate, since still images carry none
    /// * `realtime` - Pace delivery to `fps`
    pub fn open(dir: &Path, fps: f64, realtime: bool) -> Result<Self> {
        tracing::info!("Opening image sequence in {}", dir.display());

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| media_open(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        // Lexical order is playback order
        files.sort();

        if files.is_empty() {
            return Err(media_open(dir, "directory holds no frame images"));
        }

        let pacer = pacer_for(dir, Some(fps), realtime)?;
        tracing::info!(
            "Image sequence opened: {} frames at {:.2} fps, real-time {}",
            files.len(),
            fps,
            pacer.is_some()
        );

        Ok(Self {
            files,
            position: 0,
            pacer,
            rate: fps,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

impl FrameSource for ImageSequenceSource {
    fn has_next(&mut self) -> bool {
        self.position < self.files.len()
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        let index = self.position as u64 + 1;
        let path = self.files.get(self.position).ok_or(PipelineError::Decode {
            index,
            reason: "no frames remain".to_string(),
        })?;
        self.position += 1;

        let frame = image::open(path)
            .map_err(|e| PipelineError::Decode {
                index,
                reason: format!("{}: {e}", path.display()),
            })?
            .into_rgb8();

        // Frame rate limiting
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait();
        }
        Ok(frame)
    }

    fn frame_rate(&self) -> Option<f64> {
        Some(self.rate)
    }

    fn close(&mut self) {
        if !self.files.is_empty() {
            tracing::debug!("Image sequence closed at frame {}", self.position);
            self.files.clear();
            self.position = 0;
        }
    }
}
