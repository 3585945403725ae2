use std::thread;
use std::time::{Duration, Instant};

/// Holds frame delivery back to a fixed cadence.
///
/// `wait` returns immediately the first time and afterwards blocks until
/// `interval` has passed since the previous call returned.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Pacer for a declared frame rate; `None` if the rate cannot drive a cadence.
    pub fn from_rate(frames_per_second: f64) -> Option<Self> {
        if frames_per_second.is_finite() && frames_per_second > 0.0 {
            Some(Self::new(Duration::from_secs_f64(1.0 / frames_per_second)))
        } else {
            None
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next frame is due.
    ///
    /// Time the caller spends between waits counts toward the interval.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
