use std::fmt;
use std::time::Duration;

use super::session::PipelineSession;
use crate::error::Result;
use crate::output::OutputSink;
use crate::overlay::{blend, build_legend, build_mask, status_text};
use crate::rate::{RateMonitor, RateState};
use crate::segmentation::SegmentationModel;
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    Running,
    Draining,
    Stopped,
}

/// Why a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    ExitRequested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceExhausted => f.write_str("source exhausted"),
            Self::ExitRequested => f.write_str("exit requested"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Weight of the class mask in the overlay.
    pub alpha: f32,
    /// Log progress every this many frames; 0 disables it.
    pub stats_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            stats_interval: 30,
        }
    }
}

/// Final accounting for one run, produced on every exit path.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Result<StopReason>,
    pub frames: u64,
    pub elapsed_seconds: f64,
    pub fps: f64,
    pub monitor: RateMonitor,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Drives source -> model -> overlay -> sink one frame at a time.
///
/// A controller runs once: after `run` returns it is `Stopped` and its rate
/// monitor has reached its terminal state.
pub struct PipelineController<M: SegmentationModel> {
    model: M,
    config: PipelineConfig,
    legend: String,
    state: PipelineState,
    monitor: RateMonitor,
    inference_total: Duration,
}

impl<M: SegmentationModel> PipelineController<M> {
    pub fn new(model: M, config: PipelineConfig) -> Self {
        let legend = build_legend(model.labels());
        Self {
            model,
            config,
            legend,
            state: PipelineState::NotStarted,
            monitor: RateMonitor::new(),
            inference_total: Duration::ZERO,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn legend(&self) -> &str {
        &self.legend
    }

    /// Open a session from the two openers and run it to completion.
    ///
    /// # Arguments
    /// * `open_source` - Opens the frame source; called once
    /// * `open_sink` - Opens the output sink; called once, after the source
    ///
    /// Returns: a [`RunReport`] carrying the outcome and frame statistics.
    /// Never returns early: the monitor is stopped, the session released and
    /// statistics reported whether the loop ends normally or with an error.
    pub fn run<S, O, FS, FO>(&mut self, open_source: FS, open_sink: FO) -> RunReport
    where
        S: FrameSource,
        O: OutputSink,
        FS: FnOnce() -> Result<S>,
        FO: FnOnce() -> Result<O>,
    {
        tracing::info!("Starting pipeline with {}", self.model.model_id());

        let outcome = self.run_session(open_source, open_sink);
        self.enter_draining();

        let elapsed_seconds = self.monitor.elapsed_seconds().unwrap_or(0.0);
        let fps = self.monitor.compute_fps().unwrap_or(0.0);
        match &outcome {
            Ok(reason) => tracing::info!("Pipeline stopped: {}", reason),
            Err(e) => tracing::error!("Pipeline failed: {}", e),
        }
        tracing::info!("elapsed time: {:.2}", elapsed_seconds);
        tracing::info!("approx. FPS: {:.2}", fps);
        self.state = PipelineState::Stopped;

        RunReport {
            outcome,
            frames: self.monitor.count(),
            elapsed_seconds,
            fps,
            monitor: self.monitor.clone(),
        }
    }

    fn run_session<S, O, FS, FO>(&mut self, open_source: FS, open_sink: FO) -> Result<StopReason>
    where
        S: FrameSource,
        O: OutputSink,
        FS: FnOnce() -> Result<S>,
        FO: FnOnce() -> Result<O>,
    {
        self.monitor.start()?;
        self.state = PipelineState::Running;

        let mut session = PipelineSession::open(open_source, open_sink)?;
        let outcome = self.drive(&mut session);
        self.enter_draining();
        let released = session.release();

        match (outcome, released) {
            (Ok(reason), Ok(())) => Ok(reason),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                tracing::warn!("Output sink did not shut down cleanly: {}", close);
                Err(e)
            }
        }
    }

    fn drive<S, O>(&mut self, session: &mut PipelineSession<S, O>) -> Result<StopReason>
    where
        S: FrameSource,
        O: OutputSink,
    {
        loop {
            if !session.source.has_next() {
                return Ok(StopReason::SourceExhausted);
            }

            // Decode (blocks here when the source is paced)
            let frame = session.source.next_frame()?;

            // Run inference
            let result = self.model.segment(&frame)?;

            // Compose the overlay and its caption
            let text = status_text(self.model.model_id(), result.duration, &self.legend);
            let mask = build_mask(&result.class_map, self.model.labels())?;
            let overlay = blend(&frame, &mask, self.config.alpha)?;

            session.sink.send(&overlay, &text)?;

            // Update stats
            self.monitor.update()?;
            self.inference_total += result.duration;
            self.log_progress();

            // Viewer or Ctrl+C asked us to stop
            if session.sink.check_exit() {
                return Ok(StopReason::ExitRequested);
            }
        }
    }

    fn enter_draining(&mut self) {
        if self.state == PipelineState::Running {
            self.state = PipelineState::Draining;
        }
        if self.monitor.state() == RateState::Running {
            if let Err(e) = self.monitor.stop() {
                tracing::warn!("Rate monitor did not stop: {}", e);
            }
        }
    }

    fn log_progress(&self) {
        let frames = self.monitor.count();
        if self.config.stats_interval == 0 || frames % self.config.stats_interval != 0 {
            return;
        }
        let avg_inference_ms = self.inference_total.as_secs_f64() * 1000.0 / frames as f64;
        tracing::info!(
            "Frame {}: inference={:.1}ms, fps={:.1}",
            frames,
            avg_inference_ms,
            self.monitor.compute_fps().unwrap_or(0.0)
        );
    }
}
