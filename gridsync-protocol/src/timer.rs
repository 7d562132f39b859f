//! Deadline timer keyed to simulated time.
//!
//! One simulated interval ("hour") gets a fixed real-time budget, shrunk by
//! the simulation speed factor. The timer converts a sub-step index into the
//! wall-clock milliseconds still available for a network wait, so polls get
//! tighter as the interval progresses instead of always waiting the full
//! budget.

use std::time::{Duration, Instant};

use log::warn;

use crate::error::{Error, Result};

/// Real-time budget for one simulated interval at speed 1.
pub const INTERVAL_BUDGET: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct DeadlineTimer {
    origin: Instant,
    speed: u32,
    steps_per_interval: u32,
}

impl DeadlineTimer {
    /// `speed` divides the budget (speed 2 = twice real time);
    /// `steps_per_interval` is how many sub-steps the simulator takes per
    /// interval. Both must be non-zero.
    pub fn new(speed: u32, steps_per_interval: u32) -> Result<Self> {
        if speed == 0 {
            return Err(Error::Config("timer speed must be non-zero".to_string()));
        }
        if steps_per_interval == 0 {
            return Err(Error::Config(
                "steps per interval must be non-zero".to_string(),
            ));
        }
        Ok(DeadlineTimer {
            origin: Instant::now(),
            speed,
            steps_per_interval,
        })
    }

    /// Restart the interval clock. Called once per interval, when a freshly
    /// numbered block begins.
    pub fn reset(&mut self) {
        self.origin = Instant::now();
    }

    /// Milliseconds left before step `step`'s share of the budget runs out,
    /// clamped to zero once elapsed.
    ///
    /// A step outside `(0, steps_per_interval]` yields an unusable zero
    /// deadline and a warning; the caller ends up doing a non-blocking probe.
    pub fn deadline_millis(&self, step: u32) -> u64 {
        if step == 0 || step > self.steps_per_interval {
            warn!(
                "step {} outside (0, {}], deadline forced to zero",
                step, self.steps_per_interval
            );
            return 0;
        }
        let budget = INTERVAL_BUDGET.as_millis() as u64;
        let target = budget * u64::from(step)
            / u64::from(self.steps_per_interval)
            / u64::from(self.speed);
        let elapsed = self.origin.elapsed().as_millis() as u64;
        target.saturating_sub(elapsed)
    }

    /// Whether a full interval budget has passed since the last reset. This
    /// is the fixed fatal ceiling: a poll that comes back empty-handed after
    /// this point is a timeout, whatever the sub-step.
    pub fn budget_elapsed(&self) -> bool {
        self.origin.elapsed() >= INTERVAL_BUDGET / self.speed
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn steps_per_interval(&self) -> u32 {
        self.steps_per_interval
    }
}
