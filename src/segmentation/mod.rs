mod labels;
#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
pub mod types;

pub use labels::{palette_color, Label, LabelSet};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use preprocess::Preprocessor;
pub use types::{
    check_backend, Accelerator, ClassMap, Engine, SegmentationModel, SegmentationResult,
};

use std::path::Path;

use crate::error::Result;

/// Everything needed to resolve and initialize a model.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub path: &'a Path,
    pub model_id: &'a str,
    pub engine: Engine,
    pub accelerator: Accelerator,
    pub labels: LabelSet,
    pub input_size: (u32, u32),
}

/// Load the model named by `request` with the backend it asks for.
#[cfg(feature = "onnx")]
pub fn load_model(request: ModelRequest<'_>) -> Result<Box<dyn SegmentationModel>> {
    let model = OnnxSegmenter::load(
        request.path,
        request.model_id,
        request.engine,
        request.accelerator,
        request.labels,
        request.input_size,
    )?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "onnx"))]
pub fn load_model(request: ModelRequest<'_>) -> Result<Box<dyn SegmentationModel>> {
    check_backend(request.model_id, request.engine, request.accelerator)?;
    Err(crate::error::PipelineError::ModelLoad {
        model: request.model_id.to_string(),
        reason: "built without the `onnx` feature".to_string(),
    })
}
