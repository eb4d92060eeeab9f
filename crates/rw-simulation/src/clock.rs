use chrono::{DateTime, Duration, Utc};

use crate::error::{SimError, SimResult};

/// Tracks simulation time: a monotonic tick counter over a fixed step.
///
/// The simulated time of a tick is `start + time_step * elapsed_ticks`,
/// computed with checked arithmetic so an absurd step or tick count is an
/// error rather than a panic.
#[derive(Debug, Clone)]
pub struct SimClock {
    start: DateTime<Utc>,
    time_step: Duration,
    elapsed_ticks: u64,
}

impl SimClock {
    /// Create a clock at tick 0.
    pub fn new(start: DateTime<Utc>, time_step: Duration) -> Self {
        Self {
            start,
            time_step,
            elapsed_ticks: 0,
        }
    }

    /// Advance the clock by one tick. Returns the new tick count.
    pub fn advance(&mut self) -> u64 {
        self.elapsed_ticks += 1;
        self.elapsed_ticks
    }

    /// Number of ticks completed so far.
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    /// Overwrite the tick counter, e.g. to resume a run.
    pub fn set_elapsed_ticks(&mut self, ticks: u64) {
        self.elapsed_ticks = ticks;
    }

    /// Simulated time at tick 0.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Simulated time per tick.
    pub fn time_step(&self) -> Duration {
        self.time_step
    }

    /// Total simulated time elapsed, if representable.
    pub fn elapsed(&self) -> Option<Duration> {
        let ticks = i64::try_from(self.elapsed_ticks).ok()?;
        let micros = self.time_step.num_microseconds()?.checked_mul(ticks)?;
        Some(Duration::microseconds(micros))
    }

    /// The simulated time the next tick observes.
    pub fn current_time(&self) -> SimResult<DateTime<Utc>> {
        self.elapsed()
            .and_then(|offset| self.start.checked_add_signed(offset))
            .ok_or(SimError::ClockOverflow {
                elapsed_ticks: self.elapsed_ticks,
            })
    }
}
