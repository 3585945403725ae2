use std::fmt::Display;
use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use ndarray::Ix4;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::labels::LabelSet;
use super::preprocess::Preprocessor;
use super::types::{check_backend, Accelerator, Engine, SegmentationModel, SegmentationResult};
use crate::error::{PipelineError, Result};

/// Semantic segmentation network served through ONNX Runtime.
///
/// The model is expected to take one `[1, 3, H, W]` float input and produce
/// `[1, C, H, W]` class logits, with `C` no larger than the label set.
pub struct OnnxSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    model_id: String,
    engine: Engine,
    accelerator: Accelerator,
    labels: LabelSet,
}

impl OnnxSegmenter {
    /// Load an ONNX segmentation model.
    ///
    /// # Arguments
    /// * `model_path` - Path to the .onnx file
    /// * `model_id` - Name reported in logs and overlay text
    /// * `engine` / `accelerator` - Backend pairing, checked before the file is touched
    /// * `labels` - Class names, index `i` for output channel `i`
    /// * `input_size` - Model input `(width, height)`; frames are resized to it
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        model_id: &str,
        engine: Engine,
        accelerator: Accelerator,
        labels: LabelSet,
        input_size: (u32, u32),
    ) -> Result<Self> {
        let path = model_path.as_ref();
        let load_err = |reason: String| PipelineError::ModelLoad {
            model: model_id.to_string(),
            reason,
        };

        check_backend(model_id, engine, accelerator)?;

        tracing::info!(
            "Loading {} from {} (engine={}, accelerator={})",
            model_id,
            path.display(),
            engine,
            accelerator
        );

        let session = Session::builder()
            .map_err(|e| load_err(reason(e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(reason(e)))?
            .with_intra_threads(4)
            .map_err(|e| load_err(reason(e)))?
            .with_execution_providers([execution_provider(engine, accelerator)])
            .map_err(|e| load_err(reason(e)))?
            .commit_from_file(path)
            .map_err(|e| load_err(format!("{}: {e}", path.display())))?;

        tracing::info!("{} loaded successfully", model_id);

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(input_size.0, input_size.1),
            model_id: model_id.to_string(),
            engine,
            accelerator,
            labels,
        })
    }
}

fn reason(e: impl Display) -> String {
    e.to_string()
}

/// Providers fail hard so an unusable GPU surfaces as a load error instead of a silent CPU fallback.
fn execution_provider(engine: Engine, accelerator: Accelerator) -> ExecutionProviderDispatch {
    match engine {
        Engine::Cpu => CPUExecutionProvider::default().build(),
        Engine::Cuda => CUDAExecutionProvider::default().build().error_on_failure(),
        Engine::TensorRt => TensorRTExecutionProvider::default()
            .with_fp16(accelerator == Accelerator::Fp16)
            .build()
            .error_on_failure(),
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn engine(&self) -> Engine {
        self.engine
    }

    fn accelerator(&self) -> Accelerator {
        self.accelerator
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationResult> {
        let _span = tracing::debug_span!("onnx_segment").entered();
        let started = Instant::now();

        let tensor = self.preprocessor.preprocess(frame);
        let input = TensorRef::from_array_view(&tensor)
            .map_err(|e| PipelineError::Inference(reason(e)))?;

        let class_map = {
            let _infer_span = tracing::debug_span!("inference").entered();
            let outputs = self
                .session
                .run(ort::inputs![input])
                .map_err(|e| PipelineError::Inference(reason(e)))?;
            let logits = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| PipelineError::Inference(reason(e)))?
                .into_dimensionality::<Ix4>()
                .map_err(|e| PipelineError::Inference(reason(e)))?;
            Preprocessor::argmax_classes(logits)?
        };

        let (width, height) = frame.dimensions();
        Ok(SegmentationResult {
            class_map: class_map.resize_nearest(width, height),
            duration: started.elapsed(),
        })
    }
}
