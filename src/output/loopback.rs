use std::fs::File;
use std::io::Write;
use std::path::Path;

use image::RgbImage;

use super::{OutputSink, StopSignal};
use crate::error::{PipelineError, Result};

/// Streams frames to a v4l2loopback device so any video viewer can watch them.
///
/// The device carries pixels only; text lines are logged instead.
pub struct LoopbackSink {
    file: Option<File>,
    width: u32,
    height: u32,
    stop: StopSignal,
}

impl LoopbackSink {
    pub fn open<P: AsRef<Path>>(
        device_path: P,
        width: u32,
        height: u32,
        stop: StopSignal,
    ) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        // v4l2loopback accepts raw frames written straight to the device file
        let file = File::options().write(true).open(path).map_err(|e| {
            PipelineError::SinkUnavailable(format!(
                "cannot open v4l2loopback device {}: {e}",
                path.display()
            ))
        })?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file: Some(file),
            width,
            height,
            stop,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pack RGB into YUYV (YUV 4:2:2), the format v4l2loopback consumers expect.
///
/// Each pixel pair becomes `[Y0, Cb, Y1, Cr]` with the pair's chroma averaged;
/// an odd trailing pixel is paired with itself.
pub(crate) fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
    let (width, height) = rgb_image.dimensions();
    let mut yuyv = Vec::with_capacity((width.div_ceil(2) * 4 * height) as usize);
    if width == 0 {
        return yuyv;
    }

    for row in rgb_image.as_raw().chunks_exact(width as usize * 3) {
        for pair in row.chunks(6) {
            let left = ycbcr(&pair[..3]);
            let right = pair.get(3..6).map_or(left, ycbcr);
            let cb = ((left[1] as u16 + right[1] as u16 + 1) / 2) as u8;
            let cr = ((left[2] as u16 + right[2] as u16 + 1) / 2) as u8;
            yuyv.extend_from_slice(&[left[0], cb, right[0], cr]);
        }
    }

    yuyv
}

/// Full-range BT.601 in 8.8 fixed point. Luma weights sum to 256, chroma weights to 0.
fn ycbcr(rgb: &[u8]) -> [u8; 3] {
    let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);
    let scale = |acc: i32| (acc + 128) >> 8;
    let y = scale(77 * r + 150 * g + 29 * b);
    let cb = scale(-43 * r - 85 * g + 128 * b) + 128;
    let cr = scale(128 * r - 107 * g - 21 * b) + 128;
    [y, cb, cr].map(|c| c.clamp(0, 255) as u8)
}

impl OutputSink for LoopbackSink {
    fn send(&mut self, frame: &RgbImage, text: &[String]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| PipelineError::Send("loopback device is closed".to_string()))?;

        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            resized = image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        file.write_all(&rgb_to_yuyv(frame))
            .map_err(|e| PipelineError::Send(format!("v4l2loopback write failed: {e}")))?;

        for line in text.iter().flat_map(|block| block.lines()) {
            tracing::debug!("{}", line);
        }
        Ok(())
    }

    fn check_exit(&mut self) -> bool {
        self.stop.is_requested()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .map_err(|e| PipelineError::Send(format!("v4l2loopback flush failed: {e}")))?;
            tracing::info!("v4l2loopback device closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn yuyv_packs_two_bytes_per_pixel() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(2, 0, Rgb([200, 200, 200]));
        let yuyv = rgb_to_yuyv(&image);
        assert_eq!(yuyv.len(), 16);
        assert_eq!(&yuyv[..4], &[0, 128, 0, 128]);
        assert_eq!(yuyv[4], 200);
        assert_eq!(yuyv[6], 0);
    }

    #[test]
    fn odd_width_pairs_last_pixel_with_itself() {
        let image = RgbImage::from_pixel(3, 1, Rgb([255, 255, 255]));
        assert_eq!(rgb_to_yuyv(&image), vec![255, 128, 255, 128, 255, 128, 255, 128]);
    }

    #[test]
    fn ycbcr_reference_points() {
        assert_eq!(ycbcr(&[0, 0, 0]), [0, 128, 128]);
        assert_eq!(ycbcr(&[255, 255, 255]), [255, 128, 128]);
        assert_eq!(ycbcr(&[255, 0, 0]), [77, 85, 255]);
    }

    #[test]
    fn writes_frames_to_device_file_and_closes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video10");
        File::create(&path).unwrap();

        let mut sink = LoopbackSink::open(&path, 2, 2, StopSignal::new()).unwrap();
        sink.send(&RgbImage::new(4, 4), &["Model: test".to_string()])
            .unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8);
        assert!(sink.send(&RgbImage::new(2, 2), &[]).is_err());
    }

    #[test]
    fn missing_device_is_unavailable() {
        let err = LoopbackSink::open("/nonexistent/video10", 2, 2, StopSignal::new())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::SinkUnavailable(_)));
    }

    #[test]
    fn exit_follows_stop_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video10");
        File::create(&path).unwrap();

        let stop = StopSignal::new();
        let mut sink = LoopbackSink::open(&path, 2, 2, stop.clone()).unwrap();
        assert!(!sink.check_exit());
        stop.request();
        assert!(sink.check_exit());
    }
}
