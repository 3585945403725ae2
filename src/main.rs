use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use segstream::output::{LoopbackSink, SnapshotSink, StopSignal};
use segstream::pipeline::{PipelineConfig, PipelineController};
use segstream::segmentation::{self, Accelerator, Engine, LabelSet, ModelRequest, SegmentationModel};
use segstream::source::{open_source, SourceOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Raw YUYV frames to a v4l2loopback device
    Loopback,
    /// PNG per frame plus captions.txt in a directory
    Snapshot,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input video: an mp4/avi/mov/mkv file, an animated .gif, or a directory of frame images
    #[arg(short, long)]
    video: PathBuf,

    /// Path to the segmentation model (ONNX file)
    #[arg(short, long)]
    model: PathBuf,

    /// Name reported for the model; defaults to the model file stem
    #[arg(long)]
    model_id: Option<String>,

    /// Inference engine
    #[arg(long, value_enum, default_value_t = Engine::Cpu)]
    engine: Engine,

    /// Accelerator used by the engine
    #[arg(long, value_enum, default_value_t = Accelerator::Default)]
    accelerator: Accelerator,

    /// Label file (`name` or `name r g b` per line); defaults to Pascal VOC
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Model input width
    #[arg(long, default_value_t = 512)]
    input_width: u32,

    /// Model input height
    #[arg(long, default_value_t = 512)]
    input_height: u32,

    /// Declared frame rate for image-sequence input (files use their own)
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Process frames as fast as they decode instead of at the video's frame rate
    #[arg(long)]
    no_realtime: bool,

    /// Mask weight in the overlay, between 0 and 1
    #[arg(long, default_value_t = 0.5)]
    alpha: f32,

    /// Where overlay frames go
    #[arg(long, value_enum, default_value_t = SinkKind::Loopback)]
    sink: SinkKind,

    /// v4l2loopback device path, or snapshot directory
    #[arg(short, long, default_value = "/dev/video10")]
    output: PathBuf,

    /// Loopback output width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Loopback output height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Log progress every N frames (0 disables)
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("segstream starting");

    if !(0.0..=1.0).contains(&args.alpha) {
        anyhow::bail!("--alpha must be between 0 and 1, got {}", args.alpha);
    }

    let labels = match &args.labels {
        Some(path) => LabelSet::from_file(path).context("Failed to load label set")?,
        None => LabelSet::pascal_voc(),
    };

    let model_id = args.model_id.clone().unwrap_or_else(|| {
        args.model
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    });

    let model = segmentation::load_model(ModelRequest {
        path: &args.model,
        model_id: &model_id,
        engine: args.engine,
        accelerator: args.accelerator,
        labels,
        input_size: (args.input_width, args.input_height),
    })
    .context("Failed to load segmentation model")?;

    tracing::info!("Loaded model: {}", model.model_id());
    tracing::info!("Engine: {}", model.engine());
    tracing::info!("Accelerator: {}", model.accelerator());
    tracing::info!("Labels: {:?}", model.labels().names());

    let stop = StopSignal::new();
    stop.install_ctrlc_handler()
        .context("Failed to install Ctrl+C handler")?;

    let mut controller = PipelineController::new(
        model,
        PipelineConfig {
            alpha: args.alpha,
            stats_interval: args.stats_interval,
        },
    );
    tracing::debug!("Legend:\n{}", controller.legend());

    let source_options = SourceOptions {
        realtime: !args.no_realtime,
        fps: args.fps,
    };
    let open_video = || open_source(&args.video, source_options);

    let report = match args.sink {
        SinkKind::Loopback => controller.run(open_video, || {
            LoopbackSink::open(
                &args.output,
                args.output_width,
                args.output_height,
                stop.clone(),
            )
        }),
        SinkKind::Snapshot => {
            controller.run(open_video, || SnapshotSink::open(&args.output, stop.clone()))
        }
    };

    tracing::info!("Program Ending");

    report
        .outcome
        .map(|_| ())
        .with_context(|| format!("Pipeline stopped after {} frames", report.frames))
}
