//! Session stopwatch.
//!
//! Uses `tokio::time::Instant` so tests can drive it with a paused clock.

use tokio::time::Instant;

#[derive(Debug, Default, Clone)]
pub struct ExecutionTimer {
    started: Option<Instant>,
    frozen: Option<u64>,
}

impl ExecutionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart from zero.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.frozen = None;
    }

    /// Whether the clock is advancing.
    pub fn is_running(&self) -> bool {
        self.started.is_some() && self.frozen.is_none()
    }

    /// Whole seconds since `start`, or the frozen value after [`freeze`].
    ///
    /// [`freeze`]: ExecutionTimer::freeze
    pub fn elapsed_seconds_at(&self, now: Instant) -> u64 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        self.started
            .map(|started| now.saturating_duration_since(started).as_secs())
            .unwrap_or(0)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds_at(Instant::now())
    }

    /// Stop the clock and return the final reading. Freezing twice keeps the
    /// first value.
    pub fn freeze(&mut self) -> u64 {
        let value = self.elapsed_seconds();
        self.frozen = Some(value);
        value
    }
}
