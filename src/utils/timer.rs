//! Stage timing

use std::time::{Duration, Instant};
use tracing::{error, info};

/// Timer for measuring execution time
#[derive(Debug)]
pub struct Timer {
    name: String,
    start: Instant,
    checkpoints: Vec<(String, Duration)>,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            checkpoints: Vec::new(),
        }
    }

    /// Record the time elapsed so far under `name`
    pub fn checkpoint(&mut self, name: impl Into<String>) {
        self.checkpoints.push((name.into(), self.start.elapsed()));
    }

    pub fn checkpoints(&self) -> &[(String, Duration)] {
        &self.checkpoints
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop and log the timer
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!(stage = %self.name, elapsed_secs = elapsed.as_secs_f64(), "Timer stopped");
        elapsed
    }
}

/// Logs a completion line for a stage when dropped, whether the stage
/// returned normally, returned an error, or unwound.
///
/// Call [`StageGuard::succeed`] once the stage has finished its work.
#[derive(Debug)]
pub struct StageGuard {
    timer: Timer,
    succeeded: bool,
}

impl StageGuard {
    pub fn new(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        info!(stage = %stage, "Stage started");
        Self {
            timer: Timer::start(stage),
            succeeded: false,
        }
    }

    /// Record a named step inside the stage
    pub fn step(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.timer.checkpoint(name.clone());
        info!(stage = %self.timer.name, step = %name, elapsed_secs = self.timer.elapsed_secs(), "Step done");
    }

    pub fn succeed(&mut self) {
        self.succeeded = true;
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed_secs = self.timer.elapsed_secs();
        if self.succeeded {
            info!(stage = %self.timer.name, elapsed_secs, "Stage completed");
        } else {
            error!(stage = %self.timer.name, elapsed_secs, "Stage completed with failure");
        }
    }
}
