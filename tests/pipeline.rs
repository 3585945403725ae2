//! End-to-end runs of the pipeline controller against in-memory doubles.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use segstream::output::{OutputSink, SnapshotSink, StopSignal};
use segstream::pipeline::{PipelineConfig, PipelineController, PipelineState, StopReason};
use segstream::rate::RateState;
use segstream::segmentation::{
    Accelerator, ClassMap, Engine, LabelSet, SegmentationModel, SegmentationResult,
};
use segstream::source::{open_source, FrameSource, SourceOptions};
use segstream::{PipelineError, Result};

struct ScriptedSource {
    total: u64,
    fail_at: Option<u64>,
    served: u64,
    closed: Rc<Cell<u32>>,
}

impl ScriptedSource {
    fn new(total: u64, closed: Rc<Cell<u32>>) -> Self {
        Self {
            total,
            fail_at: None,
            served: 0,
            closed,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn has_next(&mut self) -> bool {
        self.served < self.total
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        self.served += 1;
        if self.fail_at == Some(self.served) {
            return Err(PipelineError::Decode {
                index: self.served,
                reason: "corrupt packet".to_string(),
            });
        }
        Ok(RgbImage::from_pixel(8, 6, Rgb([self.served as u8, 50, 100])))
    }

    fn frame_rate(&self) -> Option<f64> {
        None
    }

    fn close(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}

/// Classifies everything as background and claims 10ms per frame.
struct StubModel {
    labels: LabelSet,
    shrink: bool,
    calls: Rc<Cell<u32>>,
}

impl StubModel {
    fn new() -> Self {
        Self {
            labels: LabelSet::from_names(["background", "person"]),
            shrink: false,
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl SegmentationModel for StubModel {
    fn model_id(&self) -> &str {
        "stub"
    }

    fn engine(&self) -> Engine {
        Engine::Cpu
    }

    fn accelerator(&self) -> Accelerator {
        Accelerator::Default
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationResult> {
        self.calls.set(self.calls.get() + 1);
        let (mut width, height) = frame.dimensions();
        if self.shrink {
            width /= 2;
        }
        Ok(SegmentationResult {
            class_map: ClassMap::filled(width, height, 0),
            duration: Duration::from_millis(10),
        })
    }
}

#[derive(Default)]
struct SinkLog {
    frames: Vec<RgbImage>,
    texts: Vec<Vec<String>>,
    closes: u32,
}

struct RecordingSink {
    log: Rc<RefCell<SinkLog>>,
    exit_after: Option<usize>,
}

impl RecordingSink {
    fn new(log: Rc<RefCell<SinkLog>>) -> Self {
        Self {
            log,
            exit_after: None,
        }
    }
}

impl OutputSink for RecordingSink {
    fn send(&mut self, frame: &RgbImage, text: &[String]) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.frames.push(frame.clone());
        log.texts.push(text.to_vec());
        Ok(())
    }

    fn check_exit(&mut self) -> bool {
        self.exit_after
            .is_some_and(|after| self.log.borrow().frames.len() >= after)
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        alpha: 0.5,
        stats_interval: 4,
    }
}

#[test]
fn ten_frames_are_all_sent_and_counted() {
    let closed = Rc::new(Cell::new(0));
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let mut controller = PipelineController::new(StubModel::new(), config());

    let report = controller.run(
        || Ok(ScriptedSource::new(10, closed.clone())),
        || Ok(RecordingSink::new(log.clone())),
    );

    assert!(matches!(report.outcome, Ok(StopReason::SourceExhausted)));
    assert_eq!(log.borrow().frames.len(), 10);
    assert_eq!(report.frames, 10);
    assert_eq!(report.monitor.count(), 10);
    assert_eq!(report.monitor.state(), RateState::Stopped);
    assert!(report.elapsed_seconds > 0.0);
    assert!((report.fps - 10.0 / report.elapsed_seconds).abs() < 1e-6 * report.fps);
    assert_eq!(closed.get(), 1);
    assert_eq!(log.borrow().closes, 1);
    assert_eq!(controller.state(), PipelineState::Stopped);
    assert_eq!(controller.model().calls.get(), 10);
}

#[test]
fn overlay_and_text_reach_the_sink() {
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let mut controller = PipelineController::new(StubModel::new(), config());

    let report = controller.run(
        || Ok(ScriptedSource::new(1, Rc::new(Cell::new(0)))),
        || Ok(RecordingSink::new(log.clone())),
    );
    assert!(report.succeeded());

    let log = log.borrow();
    // background is black, so a half blend halves the frame
    assert_eq!(*log.frames[0].get_pixel(0, 0), Rgb([1, 25, 50]));
    assert_eq!(
        log.texts[0],
        vec![
            "Model: stub".to_string(),
            "Inference time: 0.010 s".to_string(),
            "Legend:".to_string(),
            controller.legend().to_string(),
        ]
    );
}

#[test]
fn decode_failure_stops_the_run_and_releases_resources() {
    let closed = Rc::new(Cell::new(0));
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let mut controller = PipelineController::new(StubModel::new(), config());

    let report = controller.run(
        || {
            let mut source = ScriptedSource::new(10, closed.clone());
            source.fail_at = Some(5);
            Ok(source)
        },
        || Ok(RecordingSink::new(log.clone())),
    );

    assert!(matches!(
        report.outcome,
        Err(PipelineError::Decode { index: 5, .. })
    ));
    assert_eq!(log.borrow().frames.len(), 4);
    assert_eq!(report.monitor.count(), 4);
    assert_eq!(report.monitor.state(), RateState::Stopped);
    assert_eq!(closed.get(), 1);
    assert_eq!(log.borrow().closes, 1);
    assert_eq!(controller.state(), PipelineState::Stopped);
}

#[test]
fn exit_request_halts_before_the_next_frame() {
    for exit_after in 1..=5 {
        let log = Rc::new(RefCell::new(SinkLog::default()));
        let mut controller = PipelineController::new(StubModel::new(), config());

        let report = controller.run(
            || Ok(ScriptedSource::new(10, Rc::new(Cell::new(0)))),
            || {
                let mut sink = RecordingSink::new(log.clone());
                sink.exit_after = Some(exit_after);
                Ok(sink)
            },
        );

        assert!(matches!(report.outcome, Ok(StopReason::ExitRequested)));
        assert_eq!(log.borrow().frames.len(), exit_after);
        assert_eq!(report.monitor.count() as usize, exit_after);
        assert_eq!(controller.model().calls.get() as usize, exit_after);
    }
}

#[test]
fn mismatched_class_map_sends_nothing() {
    let closed = Rc::new(Cell::new(0));
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let mut model = StubModel::new();
    model.shrink = true;
    let mut controller = PipelineController::new(model, config());

    let report = controller.run(
        || Ok(ScriptedSource::new(3, closed.clone())),
        || Ok(RecordingSink::new(log.clone())),
    );

    assert!(matches!(
        report.outcome,
        Err(PipelineError::DimensionMismatch { .. })
    ));
    assert!(log.borrow().frames.is_empty());
    assert_eq!(report.frames, 0);
    assert_eq!(report.fps, 0.0);
    assert_eq!(closed.get(), 1);
    assert_eq!(log.borrow().closes, 1);
}

#[test]
fn unavailable_sink_closes_the_source() {
    let closed = Rc::new(Cell::new(0));
    let mut controller = PipelineController::new(StubModel::new(), config());

    let report = controller.run(
        || Ok(ScriptedSource::new(3, closed.clone())),
        || -> Result<RecordingSink> {
            Err(PipelineError::SinkUnavailable("no viewer".to_string()))
        },
    );

    assert!(matches!(
        report.outcome,
        Err(PipelineError::SinkUnavailable(_))
    ));
    assert_eq!(closed.get(), 1);
    assert_eq!(report.monitor.state(), RateState::Stopped);
    assert_eq!(controller.model().calls.get(), 0);
}

#[test]
fn controller_runs_only_once() {
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let mut controller = PipelineController::new(StubModel::new(), config());

    let first = controller.run(
        || Ok(ScriptedSource::new(2, Rc::new(Cell::new(0)))),
        || Ok(RecordingSink::new(log.clone())),
    );
    assert!(first.succeeded());

    let second = controller.run(
        || Ok(ScriptedSource::new(2, Rc::new(Cell::new(0)))),
        || Ok(RecordingSink::new(log.clone())),
    );
    assert!(matches!(
        second.outcome,
        Err(PipelineError::InvalidState { op: "start", .. })
    ));
    assert_eq!(log.borrow().frames.len(), 2);
}

#[test]
fn image_sequence_to_snapshot_directory() {
    let input = tempfile::tempdir().unwrap();
    for i in 0..3u8 {
        RgbImage::from_pixel(6, 4, Rgb([i * 10, 0, 0]))
            .save(input.path().join(format!("{i:04}.png")))
            .unwrap();
    }
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("frames");

    let mut controller = PipelineController::new(StubModel::new(), config());
    let options = SourceOptions {
        realtime: false,
        fps: 30.0,
    };
    let report = controller.run(
        || open_source(input.path(), options),
        || SnapshotSink::open(&out_dir, StopSignal::new()),
    );

    assert!(matches!(report.outcome, Ok(StopReason::SourceExhausted)));
    assert_eq!(report.frames, 3);
    assert!(out_dir.join("frame_000003.png").exists());
    assert!(!out_dir.join("frame_000004.png").exists());
    let captions = std::fs::read_to_string(out_dir.join("captions.txt")).unwrap();
    assert_eq!(captions.matches("Model: stub").count(), 3);
}

#[test]
fn stop_signal_ends_a_snapshot_run() {
    let input = tempfile::tempdir().unwrap();
    for i in 0..5u8 {
        RgbImage::from_pixel(2, 2, Rgb([i, i, i]))
            .save(input.path().join(format!("{i:04}.png")))
            .unwrap();
    }
    let output = tempfile::tempdir().unwrap();
    let stop = StopSignal::new();
    stop.request();

    let mut controller = PipelineController::new(StubModel::new(), config());
    let report = controller.run(
        || {
            open_source(
                input.path(),
                SourceOptions {
                    realtime: false,
                    fps: 30.0,
                },
            )
        },
        || SnapshotSink::open(output.path(), stop.clone()),
    );

    assert!(matches!(report.outcome, Ok(StopReason::ExitRequested)));
    assert_eq!(report.frames, 1);
}
