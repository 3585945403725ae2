use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;

use super::{OutputSink, StopSignal};
use crate::error::{PipelineError, Result};

/// Writes each update as `frame_NNNNNN.png` and appends its text to `captions.txt`.
pub struct SnapshotSink {
    dir: PathBuf,
    captions: Option<BufWriter<File>>,
    sent: u64,
    stop: StopSignal,
}

impl SnapshotSink {
    pub fn open<P: AsRef<Path>>(dir: P, stop: StopSignal) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let unavailable =
            |e: std::io::Error| PipelineError::SinkUnavailable(format!("{}: {e}", dir.display()));

        fs::create_dir_all(&dir).map_err(unavailable)?;
        let captions = File::create(dir.join("captions.txt")).map_err(unavailable)?;

        tracing::info!("Writing snapshots to {}", dir.display());

        Ok(Self {
            dir,
            captions: Some(BufWriter::new(captions)),
            sent: 0,
            stop,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.sent
    }
}

impl OutputSink for SnapshotSink {
    fn send(&mut self, frame: &RgbImage, text: &[String]) -> Result<()> {
        let captions = self
            .captions
            .as_mut()
            .ok_or_else(|| PipelineError::Send("snapshot sink is closed".to_string()))?;

        let number = self.sent + 1;
        let path = self.dir.join(format!("frame_{number:06}.png"));
        frame
            .save(&path)
            .map_err(|e| PipelineError::Send(format!("{}: {e}", path.display())))?;

        let write_err = |e: std::io::Error| PipelineError::Send(format!("captions: {e}"));
        writeln!(captions, "[frame {number}]").map_err(write_err)?;
        for line in text {
            writeln!(captions, "{line}").map_err(write_err)?;
        }

        self.sent = number;
        Ok(())
    }

    fn check_exit(&mut self) -> bool {
        self.stop.is_requested()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut captions) = self.captions.take() {
            captions
                .flush()
                .map_err(|e| PipelineError::Send(format!("captions: {e}")))?;
            tracing::info!("Snapshot sink closed after {} frames", self.sent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn writes_numbered_frames_and_captions() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = SnapshotSink::open(&out, StopSignal::new()).unwrap();

        for i in 0..2u8 {
            let frame = RgbImage::from_pixel(3, 2, Rgb([i, 0, 0]));
            sink.send(&frame, &[format!("line {i}")]).unwrap();
        }
        sink.close().unwrap();
        sink.close().unwrap();

        assert_eq!(sink.frames_written(), 2);
        let second = image::open(out.join("frame_000002.png")).unwrap().into_rgb8();
        assert_eq!(*second.get_pixel(0, 0), Rgb([1, 0, 0]));

        let captions = fs::read_to_string(out.join("captions.txt")).unwrap();
        assert_eq!(captions, "[frame 1]\nline 0\n[frame 2]\nline 1\n");
    }

    #[test]
    fn send_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotSink::open(dir.path(), StopSignal::new()).unwrap();
        sink.close().unwrap();
        assert!(sink.send(&RgbImage::new(1, 1), &[]).is_err());
    }
}
