use std::time::Duration;

use tokio::time::Instant;

/// Cyclic animation phase derived from elapsed wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct PreviewClock {
    start: Instant,
    rate: f64,
}

impl PreviewClock {
    /// `rate` is the number of full cycles per second.
    pub fn new(start: Instant, rate: f64) -> Self {
        Self { start, rate }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn phase(&self, now: Instant) -> f64 {
        phase_at(now.saturating_duration_since(self.start), self.rate)
    }
}

/// `(elapsed * rate) mod 1`, always in `[0, 1)`.
pub fn phase_at(elapsed: Duration, rate: f64) -> f64 {
    let phase = (elapsed.as_secs_f64() * rate).rem_euclid(1.0);
    if phase.is_finite() && phase < 1.0 {
        phase
    } else {
        0.0
    }
}
