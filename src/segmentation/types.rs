use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use image::RgbImage;
use ndarray::Array2;

use super::labels::LabelSet;
use crate::error::{PipelineError, Result};

/// Per-pixel class indices, indexed `[[y, x]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    indices: Array2<u32>,
}

impl ClassMap {
    pub fn new(indices: Array2<u32>) -> Self {
        Self { indices }
    }

    /// A map where every pixel carries `class`.
    pub fn filled(width: u32, height: u32, class: u32) -> Self {
        Self::new(Array2::from_elem((height as usize, width as usize), class))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let (height, width) = self.indices.dim();
        (width as u32, height as u32)
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.indices[[y as usize, x as usize]]
    }

    pub fn indices(&self) -> &Array2<u32> {
        &self.indices
    }

    /// Nearest-neighbour rescale, used when the model runs below frame resolution.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
        let (src_w, src_h) = self.dimensions();
        if (src_w, src_h) == (width, height) {
            return self.clone();
        }
        let indices = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            let sy = y * src_h as usize / height.max(1) as usize;
            let sx = x * src_w as usize / width.max(1) as usize;
            self.indices[[sy, sx]]
        });
        Self::new(indices)
    }
}

#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub class_map: ClassMap,
    /// Wall time spent inside `segment`.
    pub duration: Duration,
}

/// Backend computation mode for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    Cpu,
    Cuda,
    #[value(name = "tensorrt")]
    TensorRt,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Cuda => f.write_str("CUDA"),
            Self::TensorRt => f.write_str("TensorRT"),
        }
    }
}

/// Hardware target / precision the engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Accelerator {
    Default,
    Gpu,
    Fp16,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Gpu => f.write_str("GPU"),
            Self::Fp16 => f.write_str("GPU (FP16)"),
        }
    }
}

/// Check an engine/accelerator pairing before any model work happens.
///
/// Not every optimization mode works with every engine; an unsupported pair
/// is a [`PipelineError::ModelLoad`] for `model_id`.
pub fn check_backend(model_id: &str, engine: Engine, accelerator: Accelerator) -> Result<()> {
    let supported = match engine {
        Engine::Cpu => matches!(accelerator, Accelerator::Default),
        Engine::Cuda => matches!(accelerator, Accelerator::Default | Accelerator::Gpu),
        Engine::TensorRt => true,
    };
    if supported {
        Ok(())
    } else {
        Err(PipelineError::ModelLoad {
            model: model_id.to_string(),
            reason: format!("accelerator {accelerator} is not supported by the {engine} engine"),
        })
    }
}

/// A loaded semantic segmentation model.
///
/// The pipeline issues at most one `segment` call at a time, so implementations
/// are free to keep mutable scratch state.
pub trait SegmentationModel {
    fn model_id(&self) -> &str;

    fn engine(&self) -> Engine;

    fn accelerator(&self) -> Accelerator;

    /// Fixed for the lifetime of the loaded model.
    fn labels(&self) -> &LabelSet;

    /// Classify every pixel of `frame`.
    ///
    /// The returned map has the frame's dimensions.
    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationResult>;
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn engine(&self) -> Engine {
        (**self).engine()
    }

    fn accelerator(&self) -> Accelerator {
        (**self).accelerator()
    }

    fn labels(&self) -> &LabelSet {
        (**self).labels()
    }

    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationResult> {
        (**self).segment(frame)
    }
}
