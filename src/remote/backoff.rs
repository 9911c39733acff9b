use std::time::Duration;

/// Exponential backoff between reconnect / re-registration attempts.
///
/// Doubles on every failure up to `max`; a success resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Record a failure; returns how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Reset after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
