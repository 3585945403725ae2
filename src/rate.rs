use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for RateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Wall-clock throughput tracker for the run loop.
///
/// Moves `idle -> running -> stopped` exactly once; a stopped monitor keeps
/// answering `elapsed_seconds`/`compute_fps` from the recorded bounds.
#[derive(Debug, Clone)]
pub struct RateMonitor {
    state: RateState,
    started: Option<Instant>,
    stopped: Option<Instant>,
    count: u64,
}

impl RateMonitor {
    pub fn new() -> Self {
        Self {
            state: RateState::Idle,
            started: None,
            stopped: None,
            count: 0,
        }
    }

    pub fn state(&self) -> RateState {
        self.state
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn start(&mut self) -> Result<()> {
        self.expect_state("start", &[RateState::Idle])?;
        self.started = Some(Instant::now());
        self.count = 0;
        self.state = RateState::Running;
        Ok(())
    }

    /// Count one processed frame.
    pub fn update(&mut self) -> Result<()> {
        self.expect_state("update", &[RateState::Running])?;
        self.count += 1;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.expect_state("stop", &[RateState::Running])?;
        self.stopped = Some(Instant::now());
        self.state = RateState::Stopped;
        Ok(())
    }

    pub fn elapsed(&self) -> Result<Duration> {
        self.expect_state("read elapsed time", &[RateState::Running, RateState::Stopped])?;
        let Some(started) = self.started else {
            return Ok(Duration::ZERO);
        };
        let end = self.stopped.unwrap_or_else(Instant::now);
        Ok(end.saturating_duration_since(started))
    }

    pub fn elapsed_seconds(&self) -> Result<f64> {
        Ok(self.elapsed()?.as_secs_f64())
    }

    pub fn compute_fps(&self) -> Result<f64> {
        Ok(fps(self.count, self.elapsed_seconds()?))
    }

    fn expect_state(&self, op: &'static str, allowed: &[RateState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                op,
                state: self.state,
            })
        }
    }
}

impl Default for RateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn fps(count: u64, elapsed_seconds: f64) -> f64 {
    if count == 0 || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    count as f64 / elapsed_seconds
}
