use image::{imageops, RgbImage};
use ndarray::{Array2, Array4, ArrayView4, Axis};

use super::types::ClassMap;
use crate::error::{PipelineError, Result};

/// Converts frames into model input tensors and model logits back into class maps.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Resize to the model input and lay the frame out as a `[1, 3, H, W]` tensor in `[0, 1]`.
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let source = if image.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        let (width, height) = source.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in source.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }
        tensor
    }

    /// Pick the highest-scoring class per pixel from `[1, C, H, W]` logits.
    pub fn argmax_classes(logits: ArrayView4<'_, f32>) -> Result<ClassMap> {
        let _span = tracing::debug_span!("postprocess").entered();

        let (batch, classes, height, width) = logits.dim();
        // An empty spatial grid has nothing to rescale to the frame
        if batch != 1 || classes == 0 || height == 0 || width == 0 {
            return Err(PipelineError::Inference(format!(
                "expected logits shaped [1, C, H, W], got {:?}",
                logits.shape()
            )));
        }

        let scores = logits.index_axis(Axis(0), 0);
        let indices = Array2::from_shape_fn((height, width), |(y, x)| {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for class in 0..classes {
                let score = scores[[class, y, x]];
                if score > best_score {
                    best = class;
                    best_score = score;
                }
            }
            best as u32
        });
        Ok(ClassMap::new(indices))
    }
}
