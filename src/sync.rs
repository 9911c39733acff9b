//! Cooperative stop signal shared between a worker thread and its owner.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A one-shot flag a worker can sleep on.
///
/// [`wait_timeout`](Self::wait_timeout) returns as soon as the signal is
/// triggered, so a stopped worker never sits out the rest of its sleep.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.cv.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`. Returns `true` if the signal fired.
    /// A timeout past the end of the clock waits until triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !*stopped {
                stopped = self.cv.wait(stopped).unwrap_or_else(PoisonError::into_inner);
            }
            return true;
        };
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = self
                .cv
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}
